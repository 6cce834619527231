//! OFX 1.02 (SGML) statement templates.

use chrono::NaiveDateTime;

use crate::models::Timezone;

pub struct Header<'a> {
    pub datetime: &'a str,
    pub cardname: &'a str,
    pub cardnumber: &'a str,
    pub firstdate: &'a str,
    pub lastdate: &'a str,
}

pub struct Entry<'a> {
    pub transaction_type: &'a str,
    pub datetime: &'a str,
    /// Magnitude only; the sign is carried by `transaction_type`.
    pub amount: u64,
    pub fitid: u64,
    pub description: &'a str,
    pub memo: &'a str,
}

pub fn header(h: &Header<'_>) -> String {
    format!(
        "\
OFXHEADER:100
DATA:OFXSGML
VERSION:102
SECURITY:NONE
ENCODING:UTF-8
CHARSET:CSUNICODE
COMPRESSION:NONE
OLDFILEUID:NONE
NEWFILEUID:NONE

<OFX>
 <SIGNONMSGSRSV1>
  <SONRS>
   <STATUS>
    <CODE>0
    <SEVERITY>INFO
   </STATUS>
   <DTSERVER>{datetime}
   <LANGUAGE>JPN
   <FI>
    <ORG>{cardname}
   </FI>
  </SONRS>
 </SIGNONMSGSRSV1>
 <CREDITCARDMSGSRSV1>
  <CCSTMTTRNRS>
   <TRNUID>0
   <STATUS>
    <CODE>0
    <SEVERITY>INFO
   </STATUS>
   <CCSTMTRS>
    <CURDEF>JPY
    <CCACCTFROM>
     <ACCTID>{cardnumber}
    </CCACCTFROM>
    <BANKTRANLIST>
     <DTSTART>{firstdate}
     <DTEND>{lastdate}
",
        datetime = h.datetime,
        cardname = h.cardname,
        cardnumber = h.cardnumber,
        firstdate = h.firstdate,
        lastdate = h.lastdate,
    )
}

pub fn transaction(e: &Entry<'_>) -> String {
    format!(
        "     <STMTTRN>
      <TRNTYPE>{transaction_type}
      <DTPOSTED>{datetime}
      <TRNAMT>{amount}
      <FITID>{fitid}
      <NAME>{description}
      <MEMO>{memo}
     </STMTTRN>
",
        transaction_type = e.transaction_type,
        datetime = e.datetime,
        amount = e.amount,
        fitid = e.fitid,
        description = e.description,
        memo = e.memo,
    )
}

pub fn footer(total_amount: i128) -> String {
    format!(
        "    </BANKTRANLIST>
    <LEDGERBAL>
     <BALAMT>{total_amount}
    </LEDGERBAL>
   </CCSTMTRS>
  </CCSTMTTRNRS>
 </CREDITCARDMSGSRSV1>
</OFX>
"
    )
}

/// `YYYYMMDDHHMMSS`, plus `[+9.00:JST]` when the zone is known.
pub fn ofx_datetime(dt: &NaiveDateTime, tz: Option<&Timezone>) -> String {
    let stamp = dt.format("%Y%m%d%H%M%S");
    match tz {
        None => stamp.to_string(),
        Some(tz) => format!("{stamp}[{:+.2}:{}]", tz.offset_hours(), tz.name),
    }
}
