// XML Voucher Decoder: pull `<VOUCHER>` blocks out of a Tally export and
// extract the known tags from each one. Real exports are frequently
// truncated or carry one mangled voucher in the middle of an otherwise
// fine batch, so each voucher is parsed independently; a corrupt fragment
// is skipped with a warning and the rest of the batch survives.
use log::warn;

use crate::types::RawRecord;

/// Tags consumed from each voucher. A missing tag yields an empty string,
/// never a decode failure for the document.
const VOUCHER_TAGS: [&str; 7] = [
    "VOUCHERTYPENAME",
    "DATE",
    "PARTYNAME",
    "STOCKITEMNAME",
    "BILLEDQTY",
    "AMOUNT",
    "BASICSALESNAME",
];

const VOUCHER_OPEN: &str = "<VOUCHER";
const VOUCHER_CLOSE: &str = "</VOUCHER>";

/// Result of decoding one XML payload: the extracted records plus how
/// many voucher fragments had to be skipped.
#[derive(Debug, Default)]
pub struct VoucherBatch {
    pub records: Vec<RawRecord>,
    pub skipped: usize,
}

/// Decode a Tally-style XML export. Text without any `<VOUCHER` marker is
/// treated as "not voucher XML" and yields an empty batch rather than an
/// error.
pub fn decode_vouchers(text: &str) -> VoucherBatch {
    if !text.contains(VOUCHER_OPEN) {
        return VoucherBatch::default();
    }

    let mut batch = VoucherBatch::default();
    for fragment in voucher_fragments(text) {
        match parse_voucher(&fragment) {
            Some(record) => batch.records.push(record),
            None => {
                batch.skipped += 1;
                warn!("skipping malformed voucher fragment ({} bytes)", fragment.len());
            }
        }
    }
    batch
}

/// Slice the raw text into one string per `<VOUCHER ...>...</VOUCHER>`
/// element. Plain substring matching would also hit `<VOUCHERTYPENAME>`,
/// so an opening marker only counts when followed by `>` or whitespace.
/// An opening tag with no closing tag before the next voucher still
/// yields a fragment, which then fails the per-voucher parse and is
/// counted as skipped.
fn voucher_fragments(text: &str) -> Vec<String> {
    let mut starts: Vec<usize> = Vec::new();
    let mut from = 0;
    while let Some(pos) = text[from..].find(VOUCHER_OPEN) {
        let start = from + pos;
        let after = text[start + VOUCHER_OPEN.len()..].chars().next();
        if matches!(after, Some('>') | Some(' ') | Some('\t') | Some('\r') | Some('\n')) {
            starts.push(start);
        }
        from = start + VOUCHER_OPEN.len();
    }

    let mut fragments = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let limit = starts.get(i + 1).copied().unwrap_or(text.len());
        let body = &text[start..limit];
        let end = body
            .find(VOUCHER_CLOSE)
            .map(|p| p + VOUCHER_CLOSE.len())
            .unwrap_or(body.len());
        fragments.push(body[..end].to_string());
    }
    fragments
}

/// Parse a single voucher fragment and extract the known tags. Returns
/// `None` when the fragment is not well-formed XML.
fn parse_voucher(fragment: &str) -> Option<RawRecord> {
    let doc = roxmltree::Document::parse(fragment).ok()?;
    let mut record = RawRecord::new();
    for tag in VOUCHER_TAGS {
        let value = doc
            .descendants()
            .find(|n| n.has_tag_name(tag))
            .and_then(|n| n.text())
            .unwrap_or("")
            .trim()
            .to_string();
        record.insert(tag.to_string(), value);
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voucher(party: &str, amount: &str) -> String {
        format!(
            "<VOUCHER VCHTYPE=\"Sales\"><VOUCHERTYPENAME>Sales</VOUCHERTYPENAME>\
             <DATE>20230401</DATE><PARTYNAME>{party}</PARTYNAME>\
             <STOCKITEMNAME>Widget</STOCKITEMNAME><BILLEDQTY>2</BILLEDQTY>\
             <AMOUNT>{amount}</AMOUNT><BASICSALESNAME>Ravi</BASICSALESNAME></VOUCHER>"
        )
    }

    #[test]
    fn extracts_known_tags_per_voucher() {
        let xml = format!("<ENVELOPE>{}{}</ENVELOPE>", voucher("Alpha", "100"), voucher("Beta", "55"));
        let batch = decode_vouchers(&xml);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped, 0);
        assert_eq!(batch.records[0]["PARTYNAME"], "Alpha");
        assert_eq!(batch.records[1]["AMOUNT"], "55");
        assert_eq!(batch.records[0]["BASICSALESNAME"], "Ravi");
    }

    #[test]
    fn text_without_voucher_marker_is_empty_not_an_error() {
        let batch = decode_vouchers("<ENVELOPE><HEADER>nothing here</HEADER></ENVELOPE>");
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn missing_tags_become_empty_strings() {
        let xml = "<VOUCHER><PARTYNAME>Gamma</PARTYNAME></VOUCHER>";
        let batch = decode_vouchers(xml);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0]["PARTYNAME"], "Gamma");
        assert_eq!(batch.records[0]["AMOUNT"], "");
        assert_eq!(batch.records[0]["DATE"], "");
    }

    #[test]
    fn one_malformed_voucher_does_not_lose_the_batch() {
        let xml = format!(
            "{}<VOUCHER><PARTYNAME>Broken & unclosed{}{}",
            voucher("Alpha", "10"),
            voucher("Beta", "20"),
            voucher("Gamma", "30")
        );
        let batch = decode_vouchers(&xml);
        assert_eq!(batch.records.len(), 3);
        assert_eq!(batch.skipped, 1);
        let parties: Vec<_> = batch.records.iter().map(|r| r["PARTYNAME"].clone()).collect();
        assert_eq!(parties, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn typename_tag_is_not_mistaken_for_a_voucher_start() {
        let xml = "<VOUCHER><VOUCHERTYPENAME>Sales</VOUCHERTYPENAME><PARTYNAME>A</PARTYNAME></VOUCHER>";
        let batch = decode_vouchers(xml);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped, 0);
    }
}
