//! Sample order-workflow plugin.
//!
//! Export indices, in registration order:
//!
//! | index | name       | calling convention |
//! |-------|------------|--------------------|
//! | 0     | `greet`    | keyword            |
//! | 1     | `shout`    | shared             |
//! | 2     | `echo`     | shared             |
//! | 3     | `charge`   | keyword (compute)  |
//! | 4     | `checkout` | keyword            |
//!
//! `checkout` waits for the `approve` signal, sleeps for standard orders and
//! then asks the host to run `charge`. While it waits the host may call the
//! `status` query and the `set_discount` update.

use anyhow::{bail, Context as _};
use fc_guest::{
    Args, BridgeConfig, Context, Dispatcher, EnumSchema, Enumeration, ExportTable, SemanticType,
    Signature, Value,
};
use log::{debug, info};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Delay used for standard orders when the host config has none.
pub const DEFAULT_STANDARD_DELAY: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Standard,
    Express,
}

impl Enumeration for Priority {
    const SCHEMA: EnumSchema = EnumSchema::new("Priority", &["standard", "express"]);

    fn wire_value(&self) -> &'static str {
        match self {
            Priority::Standard => "standard",
            Priority::Express => "express",
        }
    }

    fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "standard" => Some(Priority::Standard),
            "express" => Some(Priority::Express),
            _ => None,
        }
    }
}

/// Workflow state shared by the handlers of one plugin instance.
#[derive(Debug)]
struct OrderState {
    stage: Cell<&'static str>,
    approved_by: RefCell<Option<String>>,
    discount: Cell<i64>,
}

impl Default for OrderState {
    fn default() -> Self {
        Self {
            stage: Cell::new("idle"),
            approved_by: RefCell::new(None),
            discount: Cell::new(0),
        }
    }
}

impl OrderState {
    fn is_approved(&self) -> bool {
        self.approved_by.borrow().is_some()
    }

    fn status(&self) -> serde_json::Value {
        json!({
            "stage": self.stage.get(),
            "approved_by": self.approved_by.borrow().clone(),
            "discount": self.discount.get(),
        })
    }
}

fn standard_delay(ctx: &mut Context<'_>) -> anyhow::Result<u64> {
    match ctx.host_config().get_str("standard_delay")? {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid standard_delay '{raw}'")),
        None => Ok(DEFAULT_STANDARD_DELAY),
    }
}

/// Build the plugin's export table.
pub fn plugin() -> fc_guest::Result<Dispatcher> {
    let state = Rc::new(OrderState::default());
    let mut exports = ExportTable::new();

    exports.export(
        "greet",
        Signature::new()
            .param("name", SemanticType::Utf8String)
            .returns(SemanticType::Utf8String),
        |_ctx, args| Ok(Value::from(format!("hello, {}", args.str("name")?))),
    )?;

    exports.shared(
        "shout",
        Signature::new()
            .param("text", SemanticType::Utf8String)
            .param("times", SemanticType::Integer)
            .returns(SemanticType::Utf8String),
        |_ctx, args| {
            let times = usize::try_from(args.int("times")?).context("times must be positive")?;
            let loud = args.str("text")?.to_uppercase();
            Ok(Value::from(vec![loud.as_str(); times].join(" ")))
        },
    )?;

    exports.shared("echo", Signature::new().untyped("blob"), |_ctx, args| {
        Ok(Value::from(args.handle("blob")?))
    })?;

    let charge = exports.compute(
        "charge",
        Signature::new().param("amount", SemanticType::Integer),
        |_ctx, args| {
            let amount = args.int("amount")?;
            Ok(Value::from_json(json!({ "charged": amount })))
        },
    )?;

    let checkout_state = Rc::clone(&state);
    exports.export(
        "checkout",
        Signature::new()
            .param("amount", SemanticType::Integer)
            .param("priority", SemanticType::Enumeration(Priority::SCHEMA)),
        move |ctx, args| {
            let state = &checkout_state;
            let amount = args.int("amount")?;
            let priority: Priority = args.enumeration("priority")?;

            state.stage.set("awaiting_approval");
            info!("order of {amount} waiting for approval");
            ctx.wait_for_condition(|| state.is_approved())?;

            if priority == Priority::Standard {
                state.stage.set("queued");
                let delay = standard_delay(ctx)?;
                debug!("standard order, sleeping for {delay}");
                ctx.sleep(delay)?;
            }

            let total = amount * (100 - state.discount.get()) / 100;
            state.stage.set("charging");
            let receipt = charge.call(ctx, &Args::new().with("amount", total))?;
            ctx.var().set("last_receipt", receipt.to_string())?;
            state.stage.set("done");

            Ok(Value::from_json(json!({
                "approved_by": state.approved_by.borrow().clone(),
                "charged": total,
                "priority": priority.wire_value(),
                "receipt": receipt,
            })))
        },
    )?;

    let approve_state = Rc::clone(&state);
    exports.signal(
        "approve",
        Signature::new().param("by", SemanticType::Utf8String),
        move |_ctx, args| {
            let approver = args.str("by")?;
            info!("order approved by {approver}");
            *approve_state.approved_by.borrow_mut() = Some(approver.to_string());
            Ok(Value::Unit)
        },
    )?;

    let status_state = Rc::clone(&state);
    exports.query("status", Signature::new(), move |_ctx, _args| {
        Ok(Value::from_json(status_state.status()))
    })?;

    let discount_state = Rc::clone(&state);
    exports.update(
        "set_discount",
        Signature::new()
            .param("percent", SemanticType::Integer)
            .returns(SemanticType::Integer),
        move |_ctx, args| {
            let percent = args.int("percent")?;
            if !(0..=100).contains(&percent) {
                bail!("discount must be between 0 and 100, got {percent}");
            }
            let previous = discount_state.discount.replace(percent);
            Ok(Value::Int(previous))
        },
    )?;

    Ok(Dispatcher::new(exports, BridgeConfig::default()))
}

fc_guest::register_plugin!(plugin);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_wire_values() {
        for priority in [Priority::Standard, Priority::Express] {
            assert_eq!(Priority::from_wire(priority.wire_value()), Some(priority));
        }
        assert!(Priority::SCHEMA.parse("overnight").is_err());
    }

    #[test]
    fn test_export_indices() {
        let dispatcher = plugin().unwrap();
        let names: Vec<_> = dispatcher
            .exports()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect();
        assert_eq!(names, ["greet", "shout", "echo", "charge", "checkout"]);
    }
}
