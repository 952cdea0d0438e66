use crate::context::Context;
use crate::protocol::ComputeFn;
use crate::value::{Args, SemanticType, Value};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// How an export can be reached from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dispatched by index; arguments arrive as one JSON object.
    Export,
    /// Dispatched by index; arguments arrive as positional wire words.
    SharedExport,
    /// Answers nested `query` requests by name.
    Query,
    /// Answers `signal` replies during `wait_for_condition` by name.
    Signal,
    /// Answers nested `update` requests by name.
    Update,
}

impl Role {
    /// Whether the host reaches this role through the generic entry point.
    pub fn is_indexed(self) -> bool {
        matches!(self, Role::Export | Role::SharedExport)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Export => "export",
            Role::SharedExport => "shared export",
            Role::Query => "query",
            Role::Signal => "signal",
            Role::Update => "update",
        })
    }
}

/// One declared parameter. `ty` is `None` when the parameter is unannotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Option<SemanticType>,
}

impl Param {
    /// Type used to decode a positional wire word for this parameter.
    pub fn wire_type(&self) -> SemanticType {
        self.ty.unwrap_or(SemanticType::MemoryHandle)
    }
}

/// Ordered parameter schema plus optional return type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
    returns: Option<SemanticType>,
}

impl Signature {
    /// Empty signature: no parameters, unit return.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a typed parameter. Order matters for positional calls.
    pub fn param(mut self, name: impl Into<String>, ty: SemanticType) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: Some(ty),
        });
        self
    }

    /// Declare a parameter without a type; shared calls hand it over as a memory handle.
    pub fn untyped(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: None,
        });
        self
    }

    /// Type the return value is encoded as.
    pub fn returns(mut self, ty: SemanticType) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&SemanticType> {
        self.returns.as_ref()
    }

    /// Whether `name` is one of the declared parameters.
    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }
}

/// Type-erased function body shared by every role.
pub type Handler = Rc<dyn Fn(&mut Context<'_>, Args) -> anyhow::Result<Value>>;

/// A registered function.
pub struct ExportEntry {
    index: usize,
    role: Role,
    name: String,
    signature: Signature,
    handler: Handler,
}

impl ExportEntry {
    /// Registration index. Indexed roles share one sequence, role-scoped
    /// handlers another.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Run the function body, unwrapping bridge errors raised inside it.
    ///
    /// Arguments the signature does not declare are rejected before the
    /// body runs, whatever the role.
    pub fn call(&self, ctx: &mut Context<'_>, args: Args) -> Result<Value> {
        if let Some(name) = args.names().find(|name| !self.signature.declares(name)) {
            return Err(Error::UnexpectedArgument {
                export: self.name.clone(),
                name: name.to_string(),
            });
        }
        (self.handler)(ctx, args).map_err(Error::from_handler)
    }
}

impl fmt::Debug for ExportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportEntry")
            .field("index", &self.index)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Registry of everything the guest exposes.
///
/// Built once during plugin initialization and read-only afterwards.
#[derive(Debug, Default)]
pub struct ExportTable {
    exports: Vec<ExportEntry>,
    export_names: HashMap<(Role, String), usize>,
    handlers: HashMap<Role, HashMap<String, ExportEntry>>,
    handler_count: usize,
}

impl ExportTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `role` and return its index.
    pub fn register<F>(
        &mut self,
        role: Role,
        name: impl Into<String>,
        signature: Signature,
        handler: F,
    ) -> Result<usize>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        let name = name.into();
        let duplicate = if role.is_indexed() {
            self.export_names.contains_key(&(role, name.clone()))
        } else {
            self.handlers
                .get(&role)
                .is_some_and(|named| named.contains_key(&name))
        };
        if duplicate {
            return Err(Error::DuplicateName { role, name });
        }

        let index = if role.is_indexed() {
            self.exports.len()
        } else {
            self.handler_count
        };
        let entry = ExportEntry {
            index,
            role,
            name: name.clone(),
            signature,
            handler: Rc::new(handler),
        };

        if role.is_indexed() {
            self.export_names.insert((role, name), index);
            self.exports.push(entry);
        } else {
            self.handlers.entry(role).or_default().insert(name, entry);
            self.handler_count += 1;
        }
        log::trace!("registered {} #{}", role, index);
        Ok(index)
    }

    /// Plain export taking keyword arguments.
    pub fn export<F>(&mut self, name: &str, signature: Signature, handler: F) -> Result<usize>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        self.register(Role::Export, name, signature, handler)
    }

    /// Export taking positional, codec-decoded arguments.
    pub fn shared<F>(&mut self, name: &str, signature: Signature, handler: F) -> Result<usize>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        self.register(Role::SharedExport, name, signature, handler)
    }

    /// Query handler, run by name when the host asks mid-request.
    /// It should not call back into the host.
    pub fn query<F>(&mut self, name: &str, signature: Signature, handler: F) -> Result<usize>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        self.register(Role::Query, name, signature, handler)
    }

    /// Signal handler, run while a `wait_for_condition` is pending.
    pub fn signal<F>(&mut self, name: &str, signature: Signature, handler: F) -> Result<usize>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        self.register(Role::Signal, name, signature, handler)
    }

    /// Update handler. Its result goes back tagged with the
    /// `protocol_instance_id` of the request that triggered it.
    pub fn update<F>(&mut self, name: &str, signature: Signature, handler: F) -> Result<usize>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        self.register(Role::Update, name, signature, handler)
    }

    /// Register a compute function.
    ///
    /// The host can dispatch it like any plain export. Guest code calls it
    /// through the returned [`ComputeFn`], which routes the call via the host.
    pub fn compute<F>(&mut self, name: &str, signature: Signature, handler: F) -> Result<ComputeFn>
    where
        F: Fn(&mut Context<'_>, Args) -> anyhow::Result<Value> + 'static,
    {
        self.register(Role::Export, name, signature, handler)?;
        Ok(ComputeFn::new(name))
    }

    /// Look up a host-addressable export by index.
    pub fn get(&self, index: u32) -> Result<&ExportEntry> {
        self.exports
            .get(index as usize)
            .ok_or(Error::OutOfRangeExport {
                index,
                len: self.exports.len(),
            })
    }

    /// Look up a role-scoped handler by name.
    pub fn handler(&self, role: Role, name: &str) -> Result<&ExportEntry> {
        self.handlers
            .get(&role)
            .and_then(|named| named.get(name))
            .ok_or_else(|| Error::UnknownHandler {
                role,
                name: name.to_string(),
            })
    }

    /// Index of an indexed export by role and name.
    pub fn index_of(&self, role: Role, name: &str) -> Option<usize> {
        self.export_names.get(&(role, name.to_string())).copied()
    }

    /// Number of host-addressable exports.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportEntry> {
        self.exports.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Context<'_>, _: Args) -> anyhow::Result<Value> {
        Ok(Value::Unit)
    }

    #[test]
    fn test_indices_follow_registration_order() {
        let mut table = ExportTable::new();
        assert_eq!(table.export("a", Signature::new(), noop).unwrap(), 0);
        assert_eq!(table.query("q", Signature::new(), noop).unwrap(), 0);
        assert_eq!(table.shared("b", Signature::new(), noop).unwrap(), 1);
        assert_eq!(table.export("c", Signature::new(), noop).unwrap(), 2);

        let names: Vec<_> = table.iter().map(ExportEntry::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(table.get(1).unwrap().role(), Role::SharedExport);
    }

    #[test]
    fn test_role_scoped_handlers_are_not_indexed() {
        let mut table = ExportTable::new();
        table.update("bump", Signature::new(), noop).unwrap();

        assert!(table.is_empty());
        assert!(matches!(
            table.get(0),
            Err(Error::OutOfRangeExport { index: 0, len: 0 })
        ));
        assert_eq!(table.handler(Role::Update, "bump").unwrap().name(), "bump");
        assert!(matches!(
            table.handler(Role::Query, "bump"),
            Err(Error::UnknownHandler {
                role: Role::Query,
                ..
            })
        ));
    }

    #[test]
    fn test_names_are_unique_within_a_role() {
        let mut table = ExportTable::new();
        table.signal("go", Signature::new(), noop).unwrap();
        table.update("go", Signature::new(), noop).unwrap();

        let err = table.signal("go", Signature::new(), noop).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateName {
                role: Role::Signal,
                ..
            }
        ));
    }

    #[test]
    fn test_unannotated_params_default_to_handles() {
        let sig = Signature::new()
            .param("n", SemanticType::Integer)
            .untyped("blob");
        let types: Vec<_> = sig.params().iter().map(Param::wire_type).collect();
        assert_eq!(types, vec![SemanticType::Integer, SemanticType::MemoryHandle]);
        assert!(sig.declares("blob"));
    }
}
