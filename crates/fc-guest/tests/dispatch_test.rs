mod common;

use fc_guest::testing::ScriptedHost;
use fc_guest::{
    BridgeConfig, Dispatcher, EnumSchema, Error, ExportTable, Memory, SemanticType, Signature,
    Value,
};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const MOOD: EnumSchema = EnumSchema::new("Mood", &["calm", "busy"]);

#[test]
fn unregistered_index_fails_without_invoking_anything() {
    common::init_logging();
    let called = Rc::new(Cell::new(false));
    let flag = Rc::clone(&called);

    let mut exports = ExportTable::new();
    exports
        .export("only", Signature::new(), move |_ctx, _args| {
            flag.set(true);
            Ok(Value::Unit)
        })
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new().with_json_input(&json!({}));
    let err = dispatcher
        .dispatch(&mut host, 1, false, &[])
        .expect_err("index 1 is not registered");

    assert!(matches!(err, Error::OutOfRangeExport { index: 1, len: 1 }));
    assert!(!called.get());
    let reported = host.error.expect("error should be reported");
    assert!(reported.starts_with("export index 1 out of range (1 exports registered):\n"));
}

#[test]
fn keyword_call_passes_json_object_entries() {
    let seen = Rc::new(Cell::new(0));
    let sink = Rc::clone(&seen);

    let mut exports = ExportTable::new();
    exports
        .export(
            "f",
            Signature::new().param("x", SemanticType::Integer),
            move |_ctx, args| {
                sink.set(args.int("x")?);
                Ok(Value::from_json(json!({"doubled": args.int("x")? * 2})))
            },
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new().with_json_input(&json!({"x": 5}));
    let dispatched = dispatcher.dispatch(&mut host, 0, false, &[]).unwrap();

    assert_eq!(seen.get(), 5);
    assert_eq!(dispatched.word, 0);
    assert_eq!(host.output_json(), Some(json!({"doubled": 10})));
    assert!(host.error.is_none());
}

#[test]
fn keyword_call_rejects_undeclared_keywords() {
    let mut exports = ExportTable::new();
    exports
        .export(
            "f",
            Signature::new().param("x", SemanticType::Integer),
            |_ctx, _args| Ok(Value::Unit),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new().with_json_input(&json!({"x": 1, "y": 2}));
    let err = dispatcher.dispatch(&mut host, 0, false, &[]).unwrap_err();

    assert!(matches!(err, Error::UnexpectedArgument { ref name, .. } if name == "y"));
    assert!(host.error.is_some());
}

#[test]
fn keyword_call_requires_an_object() {
    let mut exports = ExportTable::new();
    exports
        .export("f", Signature::new(), |_ctx, _args| Ok(Value::Unit))
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new().with_json_input(&json!([1, 2]));
    let err = dispatcher.dispatch(&mut host, 0, false, &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn empty_input_counts_as_no_keywords_unless_strict() {
    let mut exports = ExportTable::new();
    exports
        .export("ping", Signature::new(), |_ctx, _args| Ok(Value::from("pong")))
        .unwrap();
    let exports = Rc::new(exports);

    let lenient = Dispatcher::from_shared(Rc::clone(&exports), BridgeConfig::default());
    let mut host = ScriptedHost::new();
    lenient.dispatch(&mut host, 0, false, &[]).unwrap();
    assert_eq!(host.output_str().as_deref(), Some("pong"));

    let strict = Dispatcher::from_shared(exports, BridgeConfig::default().with_strict_input());
    let mut host = ScriptedHost::new();
    let err = strict.dispatch(&mut host, 0, false, &[]).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn shared_call_decodes_arguments_in_declared_order() {
    let captured = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);

    let mut exports = ExportTable::new();
    exports
        .shared(
            "combine",
            Signature::new()
                .param("count", SemanticType::Integer)
                .param("label", SemanticType::Utf8String)
                .param("mood", SemanticType::Enumeration(MOOD))
                .untyped("blob"),
            move |_ctx, args| {
                *sink.borrow_mut() = Some(args.clone());
                Ok(Value::from(format!(
                    "{}x{}:{}",
                    args.int("count")?,
                    args.str("label")?,
                    args.str("mood")?
                )))
            },
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let label = host.store("tea");
    let mood = host.store("busy");
    let blob = host.store([1u8, 2, 3]);

    let dispatched = dispatcher
        .dispatch(&mut host, 0, true, &[3, label, mood, blob])
        .unwrap();

    let args = captured.borrow().clone().expect("handler should run");
    assert_eq!(args.int("count").unwrap(), 3);
    assert_eq!(args.str("label").unwrap(), "tea");
    assert_eq!(args.str("mood").unwrap(), "busy");
    assert_eq!(args.handle("blob").unwrap().offset(), blob);

    // The returned word is the offset of the stored result, which is also the output.
    let stored = host.arena.bytes(dispatched.word).expect("result should be stored");
    assert_eq!(stored, b"3xtea:busy");
    assert_eq!(host.output_str().as_deref(), Some("3xtea:busy"));
}

#[test]
fn shared_call_with_missing_region_passes_unit() {
    let captured = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);

    let mut exports = ExportTable::new();
    exports
        .shared(
            "maybe",
            Signature::new().param("text", SemanticType::Utf8String),
            move |_ctx, args| {
                *sink.borrow_mut() = args.get("text").cloned();
                Ok(Value::Unit)
            },
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let dispatched = dispatcher.dispatch(&mut host, 0, true, &[999]).unwrap();

    assert_eq!(*captured.borrow(), Some(Value::Unit));
    assert_eq!(dispatched.word, 0);
    assert!(host.output.is_none());
}

#[test]
fn shared_call_checks_arity() {
    let mut exports = ExportTable::new();
    exports
        .shared(
            "one",
            Signature::new().param("n", SemanticType::Integer),
            |_ctx, _args| Ok(Value::Unit),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let err = dispatcher.dispatch(&mut host, 0, true, &[1, 2]).unwrap_err();
    assert!(matches!(
        err,
        Error::Arity {
            expected: 1,
            got: 2,
            ..
        }
    ));
}

#[test]
fn shared_integer_result_is_returned_verbatim() {
    let mut exports = ExportTable::new();
    exports
        .shared(
            "add",
            Signature::new()
                .param("a", SemanticType::Integer)
                .param("b", SemanticType::Integer)
                .returns(SemanticType::Integer),
            |_ctx, args| Ok(Value::Int(args.int("a")? + args.int("b")?)),
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let dispatched = dispatcher.dispatch(&mut host, 0, true, &[40, 2]).unwrap();

    assert_eq!(dispatched.word, 42);
    assert!(host.output.is_none());
    assert!(host.arena.is_empty());
}

#[test]
fn keyword_result_offset_is_decoded_to_declared_type() {
    let mut exports = ExportTable::new();
    exports
        .export(
            "stash",
            Signature::new().returns(SemanticType::Utf8String),
            |ctx, _args| {
                let handle = ctx.boundary().alloc(b"stashed")?;
                Ok(Value::Int(handle.offset() as i64))
            },
        )
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let dispatched = dispatcher.dispatch(&mut host, 0, false, &[]).unwrap();

    assert_eq!(dispatched.value, Value::from("stashed"));
    assert_eq!(dispatched.word, 0);
}

#[test]
fn user_errors_are_reported_then_returned() {
    let mut exports = ExportTable::new();
    exports
        .export("explode", Signature::new(), |_ctx, _args| {
            Err(anyhow::anyhow!("inventory unavailable"))
        })
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let err = dispatcher.dispatch(&mut host, 0, false, &[]).unwrap_err();

    assert!(matches!(err, Error::UserFunction(_)));
    assert_eq!(err.to_string(), "inventory unavailable");
    let reported = host.error.expect("error should be reported");
    assert!(reported.starts_with("inventory unavailable:\n"));
    assert!(host.output.is_none());
}

#[test]
fn unencodable_results_fail_the_call() {
    let mut exports = ExportTable::new();
    exports
        .export("ratio", Signature::new(), |_ctx, _args| Ok(Value::Float(0.25)))
        .unwrap();
    let dispatcher = Dispatcher::new(exports, BridgeConfig::default());

    let mut host = ScriptedHost::new();
    let err = dispatcher.dispatch(&mut host, 0, false, &[]).unwrap_err();

    assert!(matches!(err, Error::UnsupportedType(_)));
    assert!(host.error.is_some());
}
