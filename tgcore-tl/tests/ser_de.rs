use tgcore_tl::deserialize::Error;
use tgcore_tl::{
    Blob, Cursor, Deserializable, Identifiable, RawVec, RemoteCall, Serializable, enums, functions,
    types,
};

// ── Primitives ───────────────────────────────────────────────────────────────

#[test]
fn roundtrip_integers() {
    for v in [0i32, -1, i32::MAX, i32::MIN, 42] {
        assert_eq!(i32::from_bytes(&v.to_bytes()).unwrap(), v);
    }
    for v in [0i64, -1, i64::MAX, i64::MIN, 1_234_567_890] {
        assert_eq!(i64::from_bytes(&v.to_bytes()).unwrap(), v);
    }
}

#[test]
fn double_is_little_endian_ieee() {
    let bytes = 1.5f64.to_bytes();
    assert_eq!(bytes, 1.5f64.to_le_bytes());
    assert_eq!(f64::from_bytes(&bytes).unwrap(), 1.5);
}

#[test]
fn bool_constructors() {
    assert_eq!(true.to_bytes(), 0x997275b5u32.to_le_bytes());
    assert_eq!(false.to_bytes(), 0xbc799737u32.to_le_bytes());
    assert!(bool::from_bytes(&true.to_bytes()).unwrap());
    assert!(!bool::from_bytes(&false.to_bytes()).unwrap());
}

#[test]
fn int128_and_int256() {
    let a: [u8; 16] = std::array::from_fn(|i| i as u8);
    let b: [u8; 32] = std::array::from_fn(|i| 255 - i as u8);
    let mut buf = Vec::new();
    a.serialize(&mut buf);
    b.serialize(&mut buf);
    let mut cur = Cursor::from_slice(&buf);
    assert_eq!(<[u8; 16]>::deserialize(&mut cur).unwrap(), a);
    assert_eq!(<[u8; 32]>::deserialize(&mut cur).unwrap(), b);
}

// ── String / bytes ────────────────────────────────────────────────────────────

#[test]
fn strings_of_every_header_form() {
    for s in [String::new(), "hello world".into(), "x".repeat(253), "y".repeat(254), "z".repeat(300)] {
        let bytes = s.to_bytes();
        assert_eq!(bytes.len() % 4, 0, "must be 4-byte aligned");
        assert_eq!(String::from_bytes(&bytes).unwrap(), s);
    }
}

#[test]
fn invalid_utf8_is_reported() {
    let bytes = vec![0xffu8, 0xfe].to_bytes();
    assert_eq!(String::from_bytes(&bytes), Err(Error::InvalidUtf8));
}

// ── Vectors ───────────────────────────────────────────────────────────────────

#[test]
fn boxed_vector_roundtrip_and_header() {
    let v: Vec<i64> = vec![1, -2, 3];
    let bytes = v.to_bytes();
    assert_eq!(&bytes[..4], &[0x15, 0xc4, 0xb5, 0x1c]);
    assert_eq!(Vec::<i64>::from_bytes(&bytes).unwrap(), v);
}

#[test]
fn bare_vector_has_no_header() {
    let v = RawVec(vec![7i32, 8]);
    let bytes = v.to_bytes();
    assert_eq!(&bytes[..4], &2i32.to_le_bytes());
    assert_eq!(RawVec::<i32>::from_bytes(&bytes).unwrap(), v);
}

#[test]
fn vector_of_strings() {
    let v = vec!["a".to_owned(), "bb".repeat(200)];
    assert_eq!(Vec::<String>::from_bytes(&v.to_bytes()).unwrap(), v);
}

// ── Vocabulary ───────────────────────────────────────────────────────────────

#[test]
fn function_writes_constructor_first() {
    let req = functions::GetFutureSalts { num: 1 };
    let bytes = req.to_bytes();
    assert_eq!(&bytes[..4], &functions::GetFutureSalts::CONSTRUCTOR_ID.to_le_bytes());
    assert_eq!(&bytes[4..], &1i32.to_le_bytes());
}

#[test]
fn enum_dispatches_on_tag() {
    let salt = enums::BadMsgNotification::BadServerSalt(types::BadServerSalt {
        bad_msg_id: 100,
        bad_msg_seqno: 3,
        error_code: 48,
        new_server_salt: 0x1122334455,
    });
    let bytes = salt.to_bytes();
    assert_eq!(enums::BadMsgNotification::from_bytes(&bytes).unwrap(), salt);
}

#[test]
fn enum_rejects_foreign_tag() {
    let bytes = functions::Ping { ping_id: 1 }.to_bytes();
    assert_eq!(
        enums::Pong::from_bytes(&bytes),
        Err(Error::UnknownConstructor { id: 0x7abe77ec })
    );
}

#[test]
fn future_salts_are_bare_items() {
    let fs = enums::FutureSalts::FutureSalts(types::FutureSalts {
        req_msg_id: 12,
        now: 1_700_000_000,
        salts: RawVec(vec![
            types::FutureSalt { valid_since: 1, valid_until: 2, salt: 3 },
            types::FutureSalt { valid_since: 2, valid_until: 4, salt: 5 },
        ]),
    });
    let bytes = fs.to_bytes();
    // id + req_msg_id + now + count + 2 × (int + int + long)
    assert_eq!(bytes.len(), 4 + 8 + 4 + 4 + 2 * 16);
    assert_eq!(enums::FutureSalts::from_bytes(&bytes).unwrap(), fs);
}

#[test]
fn dc_option_flags() {
    let opt = types::DcOption {
        ipv6: true,
        media_only: true,
        id: 4,
        ip_address: "2001:67c:4e8:f004::a".into(),
        port: 443,
        secret: Some(vec![1, 2, 3]),
        ..Default::default()
    };
    let bytes = opt.to_bytes();
    assert_eq!(u32::from_le_bytes(bytes[..4].try_into().unwrap()), 0b100_0000_0011);
    assert_eq!(types::DcOption::from_bytes(&bytes).unwrap(), opt);
}

#[test]
fn config_keeps_unparsed_tail() {
    let cfg = types::Config {
        flags: 0,
        date: 10,
        expires: 20,
        test_mode: true,
        this_dc: 2,
        dc_options: vec![enums::DcOption::DcOption(types::DcOption {
            id: 2,
            ip_address: "149.154.167.40".into(),
            port: 80,
            ..Default::default()
        })],
        dc_txt_domain_name: "apv3.stel.com".into(),
        tail: vec![1, 0, 0, 0, 2, 0, 0, 0],
    };
    let boxed = enums::Config::Config(cfg.clone());
    let bytes = boxed.to_bytes();
    assert_eq!(enums::Config::from_bytes(&bytes).unwrap().into_inner(), cfg);
}

#[test]
fn layer_wrapper_returns_inner_type() {
    fn returns<R: RemoteCall<Return = enums::Config>>(_: &R) {}

    let call = functions::InvokeWithLayer {
        layer: tgcore_tl::LAYER,
        query: functions::InitConnection {
            api_id: 1,
            device_model: "d".into(),
            system_version: "s".into(),
            app_version: "a".into(),
            system_lang_code: "en".into(),
            lang_pack: String::new(),
            lang_code: "en".into(),
            query: functions::help::GetConfig {},
        },
    };
    returns(&call);

    let bytes = call.to_bytes();
    assert_eq!(&bytes[..4], &0xda9b0d0du32.to_le_bytes());
    assert_eq!(&bytes[8..12], &0xc1cd5ec9u32.to_le_bytes());
    assert_eq!(&bytes[12..16], &0u32.to_le_bytes(), "initConnection flags");
    assert_eq!(&bytes[bytes.len() - 4..], &0xc4f9186bu32.to_le_bytes());
}

#[test]
fn blob_passes_through() {
    let blob = Blob(vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(blob.to_bytes(), blob.0);
    assert_eq!(Blob::from_bytes(&blob.0).unwrap(), blob);
    assert_eq!(blob.constructor_id(), Some(0x04030201));
}

#[test]
fn names_for_service_ids() {
    assert_eq!(tgcore_tl::name_for_id(0xf35c6d01), Some("rpc_result"));
    assert_eq!(tgcore_tl::name_for_id(0xdeadbeef), None);
}
