use log::LevelFilter;

/// Index of the host callback in the import table.
pub const HOST_CALLBACK_INDEX: u32 = 0;

/// Configuration for the guest bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Import slot of the host callback.
    pub host_callback_index: u32,
    /// Records below this level are not forwarded to the host.
    pub log_level: LevelFilter,
    /// Treat a zero-length input buffer on a keyword call as `{}`.
    pub empty_input_as_empty_object: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_callback_index: HOST_CALLBACK_INDEX,
            log_level: LevelFilter::Info,
            empty_input_as_empty_object: true,
        }
    }
}

impl BridgeConfig {
    pub fn with_host_callback_index(mut self, index: u32) -> Self {
        self.host_callback_index = index;
        self
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_strict_input(mut self) -> Self {
        self.empty_input_as_empty_object = false;
        self
    }
}
