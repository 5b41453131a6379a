use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;
use std::time::UNIX_EPOCH;

use crate::message::Content;
use crate::message::StreamingMessage;
use crate::message::WorkerInitRequest;
use crate::*;

fn wire<T: Marshal + ?Sized>(value: &T) -> TypedData {
    value.marshal().unwrap().expect("value should be present")
}

fn read<T: Unmarshal + Default>(data: TypedData) -> Result<T> {
    let mut out = T::default();
    out.unmarshal(&data)?;
    Ok(out)
}

// ============================================================================
//  DECODE
// ============================================================================

#[test]
fn test_decode_scalars() -> Result<()> {
    assert_eq!(decode(&TypedData::String("hi".into()))?, Value::String("hi".into()));
    assert_eq!(decode(&TypedData::Bytes(b"ab".to_vec()))?, Value::Bytes(b"ab".to_vec()));
    assert_eq!(decode(&TypedData::Stream(b"cd".to_vec()))?, Value::Bytes(b"cd".to_vec()));
    assert_eq!(decode(&TypedData::Int(-7))?, Value::Int(-7));
    assert_eq!(decode(&TypedData::Double(2.5))?, Value::Double(2.5));
    Ok(())
}

#[test]
fn test_decode_json_any_shape() -> Result<()> {
    let obj = decode(&TypedData::Json(r#"{"a":1}"#.into()))?;
    assert_eq!(obj, Value::Json(serde_json::json!({"a": 1})));

    let arr = decode(&TypedData::Json("[1,2]".into()))?;
    assert_eq!(arr, Value::Json(serde_json::json!([1, 2])));

    assert!(matches!(decode(&TypedData::Json("{".into())), Err(Error::Json(_))));
    Ok(())
}

#[test]
fn test_decode_http_record() -> Result<()> {
    let mut msg = HttpMessage {
        method: "POST".into(),
        url: "http://localhost/api".into(),
        body: Some(TypedData::String("payload".into())),
        ..HttpMessage::default()
    };
    msg.headers.insert("X-Test".into(), "yes".into());
    msg.query.insert("q".into(), "1".into());

    let value = decode(&TypedData::from(msg))?;
    assert_eq!(value.get("method"), Some(&Value::from("POST")));
    assert_eq!(value.get("url"), Some(&Value::from("http://localhost/api")));
    assert_eq!(value.get("body"), Some(&Value::from("payload")));
    // Absent raw body falls back to the decoded body.
    assert_eq!(value.get("rawBody"), Some(&Value::from("payload")));
    assert_eq!(
        value.get("headers").and_then(|h| h.get("X-Test")),
        Some(&Value::from("yes"))
    );
    assert_eq!(value.get("query").and_then(|h| h.get("q")), Some(&Value::from("1")));
    Ok(())
}

#[test]
fn test_decode_http_without_body() -> Result<()> {
    let value = decode(&TypedData::from(HttpMessage::default()))?;
    assert_eq!(value.get("body"), Some(&Value::Null));
    assert_eq!(value.get("rawBody"), Some(&Value::Null));
    Ok(())
}

#[test]
fn test_decode_unset_is_unsupported() {
    let err = codec::decode_optional(None).unwrap_err();
    assert_eq!(err, Error::UnsupportedWireType { found: "unset", target: "value" });
}

// ============================================================================
//  ROUND TRIP
// ============================================================================

#[test]
fn test_round_trip_canonical_shapes() -> Result<()> {
    assert_eq!(decode(&wire("text"))?, Value::from("text"));
    assert_eq!(decode(&wire(&b"raw".to_vec()))?, Value::Bytes(b"raw".to_vec()));
    assert_eq!(decode(&wire(&i64::MIN))?, Value::Int(i64::MIN));
    assert_eq!(decode(&wire(&1.25f64))?, Value::Double(1.25));
    assert_eq!(
        decode(&wire(&vec!["a".to_string(), "b".to_string()]))?,
        Value::Strings(vec!["a".into(), "b".into()])
    );
    assert_eq!(decode(&wire(&vec![1i64, -2]))?, Value::Ints(vec![1, -2]));
    assert_eq!(decode(&wire(&vec![0.5f64, 1.5]))?, Value::Doubles(vec![0.5, 1.5]));
    assert_eq!(
        decode(&wire(&vec![b"x".to_vec(), b"y".to_vec()]))?,
        Value::BytesList(vec![b"x".to_vec(), b"y".to_vec()])
    );
    Ok(())
}

#[test]
fn test_value_round_trip() -> Result<()> {
    let values = [
        Value::from("s"),
        Value::Int(42),
        Value::Double(0.25),
        Value::Bytes(vec![1, 2, 3]),
        Value::Strings(vec!["x".into()]),
        Value::Ints(vec![7]),
        Value::Doubles(vec![3.5]),
        Value::BytesList(vec![vec![9]]),
    ];
    for value in values {
        let data = value.marshal()?.expect("present");
        assert_eq!(decode(&data)?, value);
    }
    Ok(())
}

// ============================================================================
//  ENCODE
// ============================================================================

#[test]
fn test_integers_widen() -> Result<()> {
    assert_eq!(wire(&-3i8), TypedData::Int(-3));
    assert_eq!(wire(&65535u16), TypedData::Int(65535));
    assert_eq!(wire(&7usize), TypedData::Int(7));
    assert_eq!(wire(&vec![-1i8, 2]), TypedData::CollectionSint64(vec![-1, 2]));
    assert_eq!(wire(&vec![4u32]), TypedData::CollectionSint64(vec![4]));
    assert_eq!(wire(&vec![1.5f32]), TypedData::CollectionDouble(vec![1.5]));
    Ok(())
}

#[test]
fn test_u64_overflow_is_an_error() {
    let err = u64::MAX.marshal().unwrap_err();
    assert!(matches!(err, Error::OutOfRange { .. }));
}

#[test]
fn test_bool_is_int() {
    assert_eq!(wire(&true), TypedData::Int(1));
    assert_eq!(wire(&false), TypedData::Int(0));
    assert_eq!(wire(&Value::Bool(true)), TypedData::Int(1));
}

#[test]
fn test_absent_values() -> Result<()> {
    let none: Option<String> = None;
    assert_eq!(none.marshal()?, None);
    assert_eq!(Value::Null.marshal()?, None);
    assert_eq!(Some(Box::new(5i32)).marshal()?, Some(TypedData::Int(5)));
    Ok(())
}

#[test]
fn test_composites_are_json() -> Result<()> {
    let mut map = BTreeMap::new();
    map.insert("k".to_string(), 1);
    assert_eq!(wire(&map), TypedData::Json(r#"{"k":1}"#.into()));

    #[derive(serde::Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }
    assert_eq!(wire(&Json(Point { x: 1, y: 2 })), TypedData::Json(r#"{"x":1,"y":2}"#.into()));

    let mut record = BTreeMap::new();
    record.insert("name".to_string(), Value::from("n"));
    assert_eq!(wire(&Value::Record(record)), TypedData::Json(r#"{"name":"n"}"#.into()));
    Ok(())
}

// ============================================================================
//  UNMARSHAL
// ============================================================================

#[test]
fn test_string_accepts_text_like_variants() -> Result<()> {
    assert_eq!(read::<String>(TypedData::String("a".into()))?, "a");
    assert_eq!(read::<String>(TypedData::Int(12))?, "12");
    assert_eq!(read::<String>(TypedData::Double(1.5))?, "1.5");
    assert_eq!(read::<String>(TypedData::Double(3.0))?, "3");
    assert_eq!(read::<String>(TypedData::Bytes(b"b".to_vec()))?, "b");
    assert_eq!(read::<String>(TypedData::Stream(b"c".to_vec()))?, "c");
    assert_eq!(read::<String>(TypedData::Json(r#"{"a":1}"#.into()))?, r#"{"a":1}"#);
    assert_eq!(
        read::<String>(TypedData::Bytes(vec![0xff, 0xfe])).unwrap_err(),
        Error::InvalidUtf8
    );
    assert!(matches!(
        read::<String>(TypedData::CollectionString(vec![])),
        Err(Error::UnsupportedWireType { found: "collection_string", .. })
    ));
    Ok(())
}

#[test]
fn test_integers_parse_and_narrow() -> Result<()> {
    assert_eq!(read::<i32>(TypedData::String(" 42 ".into()))?, 42);
    assert_eq!(read::<i16>(TypedData::Int(-5))?, -5);
    assert_eq!(read::<u8>(TypedData::Json("200".into()))?, 200);
    assert!(matches!(read::<u8>(TypedData::Int(300)), Err(Error::OutOfRange { .. })));
    assert!(matches!(read::<u32>(TypedData::Int(-1)), Err(Error::OutOfRange { .. })));
    assert!(matches!(read::<i64>(TypedData::String("x".into())), Err(Error::Parse { .. })));
    assert!(matches!(read::<i64>(TypedData::Double(1.0)), Err(Error::UnsupportedWireType { .. })));
    Ok(())
}

#[test]
fn test_floats() -> Result<()> {
    assert_eq!(read::<f64>(TypedData::String("2.5".into()))?, 2.5);
    assert_eq!(read::<f64>(TypedData::Int(3))?, 3.0);
    assert_eq!(read::<f32>(TypedData::Double(0.5))?, 0.5);
    assert_eq!(read::<f64>(TypedData::Json("1e2".into()))?, 100.0);
    Ok(())
}

#[test]
fn test_bool_spellings() -> Result<()> {
    assert!(read::<bool>(TypedData::String("true".into()))?);
    assert!(read::<bool>(TypedData::String("T".into()))?);
    assert!(!read::<bool>(TypedData::String("0".into()))?);
    assert!(read::<bool>(TypedData::String("5".into()))?);
    assert!(read::<bool>(TypedData::Int(2))?);
    assert!(!read::<bool>(TypedData::Int(0))?);
    assert!(read::<bool>(TypedData::Json("true".into()))?);
    assert!(matches!(read::<bool>(TypedData::String("maybe".into())), Err(Error::Parse { .. })));
    Ok(())
}

#[test]
fn test_bytes_accept_four_variants() -> Result<()> {
    for data in [
        TypedData::Bytes(b"v".to_vec()),
        TypedData::Stream(b"v".to_vec()),
        TypedData::String("v".into()),
        TypedData::Json("v".into()),
    ] {
        assert_eq!(read::<Vec<u8>>(data)?, b"v".to_vec());
    }
    assert!(read::<Vec<u8>>(TypedData::Int(1)).is_err());
    Ok(())
}

#[test]
fn test_collections_match_exactly() -> Result<()> {
    assert_eq!(read::<Vec<i8>>(TypedData::CollectionSint64(vec![1, -1]))?, vec![1, -1]);
    assert_eq!(read::<Vec<u16>>(TypedData::CollectionSint64(vec![9]))?, vec![9]);
    assert_eq!(read::<Vec<f32>>(TypedData::CollectionDouble(vec![0.5]))?, vec![0.5]);
    assert_eq!(read::<Vec<String>>(TypedData::CollectionString(vec!["s".into()]))?, vec!["s"]);
    assert_eq!(read::<Vec<Vec<u8>>>(TypedData::CollectionBytes(vec![vec![1]]))?, vec![vec![1]]);
    assert!(matches!(
        read::<Vec<i8>>(TypedData::CollectionSint64(vec![1000])),
        Err(Error::OutOfRange { .. })
    ));
    assert!(read::<Vec<String>>(TypedData::CollectionSint64(vec![1])).is_err());
    Ok(())
}

#[test]
fn test_maps_parse_json_text() -> Result<()> {
    let expected: HashMap<String, i32> = [("a".to_string(), 1)].into_iter().collect();
    assert_eq!(read::<HashMap<String, i32>>(TypedData::Json(r#"{"a":1}"#.into()))?, expected);
    assert_eq!(read::<HashMap<String, i32>>(TypedData::Bytes(br#"{"a":1}"#.to_vec()))?, expected);
    assert!(matches!(
        read::<HashMap<String, i32>>(TypedData::Json("{".into())),
        Err(Error::Json(_))
    ));

    #[derive(Default, serde::Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
    }
    let Json(point) = read::<Json<Point>>(TypedData::String(r#"{"x":4}"#.into()))?;
    assert_eq!(point, Point { x: 4 });
    Ok(())
}

#[test]
fn test_value_is_best_effort() -> Result<()> {
    assert_eq!(read::<Value>(TypedData::Int(1))?, Value::Int(1));
    assert_eq!(
        read::<Value>(TypedData::Json(r#"{"a":true}"#.into()))?,
        Value::Json(serde_json::json!({"a": true}))
    );
    Ok(())
}

#[test]
fn test_option_allocates_on_write() -> Result<()> {
    let mut slot: Option<String> = None;
    slot.unmarshal(&TypedData::String("set".into()))?;
    assert_eq!(slot.as_deref(), Some("set"));
    Ok(())
}

// ============================================================================
//  DERIVE
// ============================================================================

#[derive(Default, crate::Record)]
struct Inner {
    pub promoted: String,
}

#[derive(Default, crate::Record)]
struct Outer {
    #[binding("original")]
    pub blob: Vec<u8>,
    pub string_data: String,
    #[binding(flatten)]
    inner: Inner,
    #[binding(skip)]
    pub ignored: i64,
    #[binding(omit_empty, string)]
    pub count: i64,
    hidden: i64,
}

#[test]
fn test_record_fields() {
    let fields = Outer::fields();
    let names: Vec<_> = fields.iter().map(|f| (f.name, f.tag)).collect();
    assert_eq!(
        names,
        vec![
            ("Blob", Some("original")),
            ("StringData", None),
            ("Inner", None),
            ("Count", None),
        ]
    );
    assert!(fields[2].embedded.is_some());
    assert!(fields[3].hints.omit_empty);
    assert!(fields[3].hints.as_string);
}

#[test]
fn test_record_slots() -> Result<()> {
    let mut outer = Outer::default();
    outer
        .slot_mut(&[0])
        .expect("blob slot")
        .unmarshal(&TypedData::String("data".into()))?;
    outer
        .slot_mut(&[2, 0])
        .expect("promoted slot")
        .unmarshal(&TypedData::Int(3))?;

    assert_eq!(outer.blob, b"data".to_vec());
    assert_eq!(outer.inner.promoted, "3");
    assert_eq!(outer.hidden, 0);
    assert!(outer.slot(&[2]).is_none());
    assert!(outer.slot(&[9]).is_none());
    assert_eq!(outer.slot(&[1]).expect("string slot").marshal()?, Some(TypedData::String(String::new())));
    Ok(())
}

#[derive(Debug, Default, PartialEq, crate::Marshal, crate::Unmarshal)]
struct Celsius(f32);

#[test]
fn test_newtype_delegates() -> Result<()> {
    assert_eq!(wire(&Celsius(1.5)), TypedData::Double(1.5));
    assert_eq!(read::<Celsius>(TypedData::Int(20))?, Celsius(20.0));
    Ok(())
}

// ============================================================================
//  MESSAGES
// ============================================================================

#[test]
fn test_message_json_shape() -> std::result::Result<(), serde_json::Error> {
    let msg = StreamingMessage::new(
        "req-1",
        WorkerInitRequest { host_version: "4.0".into(), capabilities: HashMap::new() },
    );
    let text = serde_json::to_string(&msg)?;
    assert!(text.contains(r#""requestId":"req-1""#));
    assert!(text.contains(r#""workerInitRequest""#));
    assert!(text.contains(r#""hostVersion":"4.0""#));

    let back: StreamingMessage = serde_json::from_str(&text)?;
    assert_eq!(back, msg);
    assert!(matches!(back.content, Content::WorkerInitRequest(_)));
    Ok(())
}

#[test]
fn test_typed_data_json_tags() -> std::result::Result<(), serde_json::Error> {
    let text = serde_json::to_string(&TypedData::CollectionSint64(vec![1]))?;
    assert_eq!(text, r#"{"collectionSint64":[1]}"#);

    // Collections are bare arrays and bytes are number arrays on this framing.
    let text = serde_json::to_string(&TypedData::CollectionString(vec!["a".into()]))?;
    assert_eq!(text, r#"{"collectionString":["a"]}"#);
    let text = serde_json::to_string(&TypedData::Bytes(vec![1, 2]))?;
    assert_eq!(text, r#"{"bytes":[1,2]}"#);
    Ok(())
}

#[test]
fn test_timestamp_before_epoch() {
    let t = UNIX_EPOCH - Duration::from_millis(1500);
    assert_eq!(Timestamp::from(t), Timestamp { seconds: -2, nanos: 500_000_000 });
}

#[test]
fn test_http_default_status() {
    assert_eq!(HttpMessage::default().status(), "200");
    assert_eq!(HttpMessage::wrap(TypedData::Int(1)).status_code, "200");
}
