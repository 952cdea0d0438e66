use fc_guest::{
    BridgeConfig, Dispatcher, ExportTable, ImportSlot, ImportTable, Result, Signature, Value,
};

fn callback(args: &[u64]) -> Result<u64> {
    Ok(args.len() as u64)
}

fn fetch_rate(args: &[u64]) -> Result<u64> {
    Ok(args.first().copied().unwrap_or_default() * 3)
}

static IMPORTS: &[ImportSlot] = &[callback, fetch_rate];

fn plugin() -> Result<Dispatcher> {
    let mut exports = ExportTable::new();
    exports.export("noop", Signature::new(), |_ctx, _args| Ok(Value::Unit))?;
    Ok(Dispatcher::new(exports, BridgeConfig::default()))
}

fc_guest::register_plugin!(plugin, imports = IMPORTS);

#[test]
fn registered_import_table_dispatches_by_slot() {
    let table = ImportTable::new(IMPORTS);

    assert_eq!(table.len(), 2);
    assert_eq!(table.call(0, &[1, 2]).unwrap(), 2);
    assert_eq!(table.call(1, &[7]).unwrap(), 21);
    assert!(table.call(2, &[]).is_err());
}

#[test]
fn plugin_init_builds_the_dispatcher() {
    let dispatcher = plugin().unwrap();
    assert_eq!(dispatcher.exports().len(), 1);
}
