//! End-to-end scenarios over the FIX.4.4 fixture dictionary.

use arenafix::{
    CheckFlags, ErrorCode, FixError, GroupId, Parser, ParserConfig, decode_header, tags,
};
use arenafix_dictionary::Dictionary;

const FIX44: &str = include_str!("data/fix44.xml");
const ROOT: GroupId = GroupId::ROOT;

fn parser(flags: CheckFlags) -> Parser {
    Parser::new(
        Dictionary::from_xml(FIX44).unwrap(),
        ParserConfig::default(),
        flags,
    )
    .unwrap()
}

fn new_order_single(parser: &Parser) -> arenafix::Message {
    let mut msg = parser.create_msg("D").unwrap();
    msg.set_string(ROOT, 49, "S").unwrap();
    msg.set_string(ROOT, 56, "T").unwrap();
    msg.set_i64(ROOT, 34, 1).unwrap();
    msg.set_string(ROOT, 52, "20240101-00:00:00").unwrap();
    msg.set_string(ROOT, 11, "CL1").unwrap();
    msg.set_string(ROOT, 55, "AAA").unwrap();
    msg.set_char(ROOT, 54, '1').unwrap();
    msg.set_i64(ROOT, 38, 100).unwrap();
    msg.set_f64(ROOT, 44, 50.5).unwrap();
    msg.set_char(ROOT, 59, '0').unwrap();
    msg
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[test]
fn scenario_1_build_and_serialize_new_order_single() {
    let parser = parser(CheckFlags::NONE);
    let mut msg = new_order_single(&parser);

    let mut out = [0u8; 512];
    let n = msg.encode(b'|', &mut out).unwrap();
    let text = std::str::from_utf8(&out[..n]).unwrap();

    assert!(text.starts_with("8=FIX.4.4|9="));
    let after_len = text.find("|35=D|").unwrap();
    assert!(after_len > 0);

    // Trailer: "|10=NNN|" with NNN the byte sum of everything before it.
    let crc_at = text.rfind("10=").unwrap();
    let declared: u8 = text[crc_at + 3..crc_at + 6].parse().unwrap();
    assert_eq!(declared, checksum(&out[..crc_at]));
    assert!(text.ends_with(&format!("|10={declared:03}|")));
}

#[test]
fn scenario_1_serialize_then_parse_is_identity() {
    let parser = parser(CheckFlags::ALL);
    let mut msg = new_order_single(&parser);
    let mut wire = [0u8; 512];
    let n = msg.encode(b'|', &mut wire).unwrap();

    let (parsed, stop) = parser.parse(&wire[..n], b'|').unwrap();
    assert_eq!(stop, n);
    assert_eq!(parsed.msg_type(), "D");
    assert_eq!(parsed.body_len(), msg.body_len());
    for tag in [49u32, 56, 52, 11, 55] {
        assert_eq!(
            parsed.get_raw(ROOT, tag).unwrap(),
            msg.get_raw(ROOT, tag).unwrap()
        );
    }
    assert_eq!(parsed.get_f64(ROOT, 44).unwrap(), 50.5);

    // The round-tripped message serializes byte-identically.
    let mut again = [0u8; 512];
    let mut parsed = parsed;
    let m = parsed.encode(b'|', &mut again).unwrap();
    assert_eq!(&wire[..n], &again[..m]);
}

#[test]
fn scenario_2_market_data_group_round_trip() {
    let parser = parser(CheckFlags::NONE);
    let mut msg = parser.create_msg("W").unwrap();
    msg.set_string(ROOT, 49, "S").unwrap();
    msg.set_string(ROOT, 56, "T").unwrap();
    msg.set_i64(ROOT, 34, 2).unwrap();
    msg.set_string(ROOT, 52, "20240101-00:00:01").unwrap();
    msg.set_string(ROOT, 55, "AAA").unwrap();
    let g0 = msg.add_group(ROOT, 268).unwrap();
    msg.set_char(g0, 269, '0').unwrap();
    msg.set_string(g0, 270, "1.0").unwrap();
    let g1 = msg.add_group(ROOT, 268).unwrap();
    msg.set_char(g1, 269, '1').unwrap();
    msg.set_string(g1, 270, "2.0").unwrap();

    let mut wire = [0u8; 512];
    let n = msg.encode(b'|', &mut wire).unwrap();
    let text = std::str::from_utf8(&wire[..n]).unwrap();
    assert!(text.contains("|268=2|269=0|270=1.0|269=1|270=2.0|"));

    let (parsed, _) = parser.parse(&wire[..n], b'|').unwrap();
    assert_eq!(parsed.group_count(ROOT, 268).unwrap(), 2);
    let p0 = parsed.group(ROOT, 268, 0).unwrap();
    let p1 = parsed.group(ROOT, 268, 1).unwrap();
    assert_eq!(parsed.get_char(p0, 269).unwrap(), '0');
    assert_eq!(parsed.get_f64(p0, 270).unwrap(), 1.0);
    assert_eq!(parsed.get_char(p1, 269).unwrap(), '1');
    assert_eq!(parsed.get_f64(p1, 270).unwrap(), 2.0);

    let mut again = [0u8; 512];
    let mut parsed = parsed;
    let m = parsed.encode(b'|', &mut again).unwrap();
    assert_eq!(&wire[..n], &again[..m]);
}

#[test]
fn scenario_3_header_preview_without_a_message() {
    let parser = parser(CheckFlags::NONE);
    let mut msg = new_order_single(&parser);
    let mut wire = [0u8; 512];
    let n = msg.encode(b'|', &mut wire).unwrap();

    let header = decode_header(&wire[..n], b'|').unwrap();
    assert_eq!(header.begin_string, b"FIX.4.4");
    assert_eq!(header.msg_type, b"D");
    assert_eq!(header.sender_comp_id, b"S");
    assert_eq!(header.target_comp_id, b"T");
    assert_eq!(header.msg_seq_num, 1);
}

#[test]
fn scenario_4_flipped_body_byte_fails_the_integrity_check() {
    let strict = parser(CheckFlags::CRC);
    let mut msg = new_order_single(&strict);
    let mut wire = [0u8; 512];
    let n = msg.encode(b'|', &mut wire).unwrap();

    let text = std::str::from_utf8(&wire[..n]).unwrap();
    let at = text.find("55=AAA").unwrap() + 3;
    wire[at] = b'Z';
    assert!(matches!(
        strict.parse(&wire[..n], b'|'),
        Err(FixError::IntegrityCheck { .. })
    ));
    assert_eq!(strict.last_error_code(), Some(ErrorCode::IntegrityCheck));
}

#[test]
fn scenario_5_unknown_tag_skipped_or_rejected() {
    // Splice an undeclared tag into a valid message and refresh the frame.
    let body = "35=D|49=S|56=T|34=1|52=20240101-00:00:00|11=CL1|55=AAA|54=1|7777=zz|59=0|";
    let head = format!("8=FIX.4.4|9={}|{body}", body.len());
    let wire = format!("{head}10={:03}|", checksum(head.as_bytes()));

    let lax = parser(CheckFlags::NONE);
    let (msg, _) = lax.parse(wire.as_bytes(), b'|').unwrap();
    assert!(msg.get_raw(ROOT, 7777).is_err());
    assert_eq!(msg.get_char(ROOT, 59).unwrap(), '0');

    let strict = parser(CheckFlags::EXISTING);
    assert!(matches!(
        strict.parse(wire.as_bytes(), b'|'),
        Err(FixError::UnknownField(_))
    ));
}

#[test]
fn scenario_6_missing_required_field_names_it() {
    let strict = parser(CheckFlags::REQUIRED);
    let body = "35=D|49=S|56=T|34=1|52=20240101-00:00:00|11=CL1|54=1|";
    let head = format!("8=FIX.4.4|9={}|{body}", body.len());
    let wire = format!("{head}10={:03}|", checksum(head.as_bytes()));

    match strict.parse(wire.as_bytes(), b'|') {
        Err(FixError::UnknownField(text)) => assert!(text.contains("Symbol")),
        other => panic!("expected UnknownField for Symbol, got {other:?}"),
    }
    assert_eq!(strict.last_error_code(), Some(ErrorCode::UnknownField));
}

#[test]
fn wrong_protocol_version_is_rejected() {
    let parser = parser(CheckFlags::NONE);
    let wire = "8=FIX.4.2|9=5|35=0|10=000|";
    assert!(matches!(
        parser.parse(wire.as_bytes(), b'|'),
        Err(FixError::WrongProtocolVer { .. })
    ));
}

#[test]
fn truncated_input_reports_data_too_short() {
    let parser = parser(CheckFlags::NONE);
    let mut msg = new_order_single(&parser);
    let mut wire = [0u8; 512];
    let n = msg.encode(b'|', &mut wire).unwrap();
    assert!(matches!(
        parser.parse(&wire[..n - 10], b'|'),
        Err(FixError::DataTooShort { .. })
    ));
}

#[test]
fn group_index_at_count_is_out_of_range() {
    let parser = parser(CheckFlags::NONE);
    let mut msg = parser.create_msg("W").unwrap();
    msg.set_string(ROOT, 55, "AAA").unwrap();
    let g0 = msg.add_group(ROOT, 268).unwrap();
    msg.set_char(g0, 269, '0').unwrap();
    assert!(matches!(
        msg.group(ROOT, 268, 1),
        Err(FixError::GroupWrongIndex {
            tag: 268,
            index: 1
        })
    ));
}

#[test]
fn page_pool_limit_is_enforced() {
    let dict = Dictionary::from_xml(FIX44).unwrap();
    let tiny = Parser::new(
        dict,
        ParserConfig {
            page_size: 64,
            num_pages: 1,
            max_pages: 2,
            num_groups: 1,
            max_groups: 4,
        },
        CheckFlags::NONE,
    )
    .unwrap();

    let mut msg = tiny.create_msg("D").unwrap();
    let filler = "x".repeat(60);
    let mut result = Ok(());
    for tag in [11u32, 1, 55, 52] {
        result = msg.set_string(ROOT, tag, &filler);
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(FixError::NoMorePages { max_pages: 2 })));
    assert_eq!(tiny.last_error_code(), Some(ErrorCode::NoMorePages));
}

#[test]
fn oversized_value_reports_too_big_page() {
    let dict = Dictionary::from_xml(FIX44).unwrap();
    let tiny = Parser::new(
        dict,
        ParserConfig {
            page_size: 32,
            num_pages: 1,
            max_pages: 4,
            num_groups: 1,
            max_groups: 4,
        },
        CheckFlags::NONE,
    )
    .unwrap();
    let mut msg = tiny.create_msg("D").unwrap();
    assert!(matches!(
        msg.set_string(ROOT, 11, &"x".repeat(33)),
        Err(FixError::TooBigPage { .. })
    ));
}

#[test]
fn group_pool_limit_is_enforced() {
    let dict = Dictionary::from_xml(FIX44).unwrap();
    let tiny = Parser::new(
        dict,
        ParserConfig {
            page_size: 512,
            num_pages: 1,
            max_pages: 8,
            num_groups: 1,
            max_groups: 3,
        },
        CheckFlags::NONE,
    )
    .unwrap();
    // The root store consumes one; two instances exhaust the pool.
    let mut msg = tiny.create_msg("W").unwrap();
    msg.add_group(ROOT, 268).unwrap();
    msg.add_group(ROOT, 268).unwrap();
    assert!(matches!(
        msg.add_group(ROOT, 268),
        Err(FixError::NoMoreGroups { max_groups: 3 })
    ));
}

#[test]
fn pools_do_not_grow_across_create_free_cycles() {
    let dict = Dictionary::from_xml(FIX44).unwrap();
    let parser = Parser::new(
        dict,
        ParserConfig {
            page_size: 256,
            num_pages: 2,
            max_pages: 4,
            num_groups: 1,
            max_groups: 4,
        },
        CheckFlags::NONE,
    )
    .unwrap();

    // Each iteration needs most of the configured maxima; if a message ever
    // failed to return its pages or group stores, a later cycle would die
    // with a resource error.
    for i in 0..100 {
        let mut msg = parser.create_msg("W").unwrap();
        msg.set_string(ROOT, 49, "SENDER").unwrap();
        msg.set_string(ROOT, 56, "TARGET").unwrap();
        msg.set_i64(ROOT, 34, i).unwrap();
        msg.set_string(ROOT, 55, "EUR/USD").unwrap();
        let g0 = msg.add_group(ROOT, 268).unwrap();
        msg.set_char(g0, 269, '0').unwrap();
        msg.set_f64(g0, 270, 1.372).unwrap();
        let g1 = msg.add_group(ROOT, 268).unwrap();
        msg.set_char(g1, 269, '1').unwrap();
        msg.set_f64(g1, 270, 1.373).unwrap();
        let g2 = msg.add_group(ROOT, 268).unwrap();
        msg.set_char(g2, 269, '2').unwrap();

        let mut wire = [0u8; 512];
        let n = msg.encode(b'|', &mut wire).unwrap();
        drop(msg);

        let (parsed, _) = parser.parse(&wire[..n], b'|').unwrap();
        assert_eq!(parsed.group_count(ROOT, 268).unwrap(), 3);
        drop(parsed);
    }
}

#[test]
fn messages_outlive_sibling_messages_not_the_parser() {
    let parser = parser(CheckFlags::NONE);
    let mut a = parser.create_msg("D").unwrap();
    let mut b = parser.create_msg("W").unwrap();
    a.set_string(ROOT, 11, "A1").unwrap();
    b.set_string(ROOT, 55, "SYM").unwrap();
    drop(a);
    // b keeps working after its sibling returned resources to the pools.
    assert_eq!(b.get_str(ROOT, 55).unwrap(), "SYM");
    b.set_string(ROOT, 55, "SYM2").unwrap();
    assert_eq!(b.get_str(ROOT, 55).unwrap(), "SYM2");
}

#[test]
fn nested_party_group_round_trips() {
    let parser = parser(CheckFlags::NONE);
    let mut msg = parser.create_msg("W").unwrap();
    msg.set_string(ROOT, 55, "AAA").unwrap();
    let entry = msg.add_group(ROOT, 268).unwrap();
    msg.set_char(entry, 269, '2').unwrap();
    msg.set_f64(entry, 270, 99.25).unwrap();
    let party = msg.add_group(entry, 453).unwrap();
    msg.set_string(party, 448, "DESK7").unwrap();

    let mut wire = [0u8; 512];
    let n = msg.encode(b'|', &mut wire).unwrap();
    let text = std::str::from_utf8(&wire[..n]).unwrap();
    assert!(text.contains("|268=1|269=2|270=99.25|453=1|448=DESK7|"));

    let (parsed, _) = parser.parse(&wire[..n], b'|').unwrap();
    let entry = parsed.group(ROOT, 268, 0).unwrap();
    let party = parsed.group(entry, 453, 0).unwrap();
    assert_eq!(parsed.get_str(party, 448).unwrap(), "DESK7");
}

#[test]
fn delimiter_parameter_supports_soh() {
    let parser = parser(CheckFlags::ALL);
    let mut msg = new_order_single(&parser);
    let mut wire = [0u8; 512];
    let n = msg.encode(0x01, &mut wire).unwrap();
    let (parsed, stop) = parser.parse(&wire[..n], 0x01).unwrap();
    assert_eq!(stop, n);
    assert_eq!(parsed.get_str(ROOT, 55).unwrap(), "AAA");

    let header = decode_header(&wire[..n], 0x01).unwrap();
    assert_eq!(header.msg_seq_num, 1);
}

#[test]
fn tag_constants_match_the_wire() {
    assert_eq!(tags::BEGIN_STRING, 8);
    assert_eq!(tags::BODY_LENGTH, 9);
    assert_eq!(tags::CHECK_SUM, 10);
    assert_eq!(tags::MSG_TYPE, 35);
}
