use crate::context::Context;
use crate::exports::Role;
use crate::protocol::Discriminant;
use crate::Result;
use serde_json::json;

impl<'a> Context<'a> {
    /// Block until the host answers a timer request for `delay`.
    ///
    /// The delay unit is whatever the host's timer uses. Nested update and
    /// query requests are serviced while waiting.
    pub fn sleep(&mut self, delay: u64) -> Result<()> {
        self.call_host(Discriminant::Timer, &json!({ "delay": delay }))?;
        Ok(())
    }

    /// Block until `condition` holds.
    ///
    /// The host either asks the guest to re-check the condition or names a
    /// signal handler to run first. Once a re-check fails, later requests
    /// carry `skip: true`.
    pub fn wait_for_condition<F>(&mut self, mut condition: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        let mut skip = false;
        loop {
            let payload = json!({ "name": [], "skip": skip });
            let reply = self.call_host(Discriminant::Signal, &payload)?;

            if reply.check_condition {
                if condition() {
                    return Ok(());
                }
                skip = true;
                continue;
            }

            let name = reply.handler_name()?;
            let args = reply.keyword_args()?;
            self.invoke(Role::Signal, name, args)?;
            if condition() {
                return Ok(());
            }
        }
    }
}
