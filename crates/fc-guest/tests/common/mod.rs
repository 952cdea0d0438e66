#![allow(dead_code)]

use fc_guest::{Args, Context, ExportTable, Signature, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared list of handler invocations, in call order.
pub type CallLog = Rc<RefCell<Vec<(String, Args)>>>;

/// Signature declaring `params` without types.
pub fn untyped(params: &[&str]) -> Signature {
    params
        .iter()
        .fold(Signature::new(), |sig, param| sig.untyped(*param))
}

/// Register an update handler taking `params` that records its calls and
/// returns `ret`.
pub fn recording_update(
    exports: &mut ExportTable,
    name: &str,
    params: &[&str],
    ret: Value,
    calls: &CallLog,
) {
    let calls = Rc::clone(calls);
    let label = name.to_string();
    exports
        .update(name, untyped(params), move |_ctx: &mut Context<'_>, args| {
            calls.borrow_mut().push((label.clone(), args));
            Ok(ret.clone())
        })
        .unwrap();
}

pub fn recording_query(
    exports: &mut ExportTable,
    name: &str,
    params: &[&str],
    ret: Value,
    calls: &CallLog,
) {
    let calls = Rc::clone(calls);
    let label = name.to_string();
    exports
        .query(name, untyped(params), move |_ctx: &mut Context<'_>, args| {
            calls.borrow_mut().push((label.clone(), args));
            Ok(ret.clone())
        })
        .unwrap();
}
