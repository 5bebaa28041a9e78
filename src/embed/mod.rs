//! Embedded static resources.
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::HotreloadVars;
//!
//! let js = HotreloadVars::default().render();
//! ```

pub mod serve {
    /// Live-reload client, injected into every served HTML page.
    const HOTRELOAD_JS: &str = include_str!("serve/hotreload.js");

    /// Settings baked into hotreload.js.
    #[derive(Debug, Clone)]
    pub struct HotreloadVars {
        /// WebSocket endpoint on the page's own host.
        pub ws_path: String,
        /// First reconnect delay, doubled on each failure.
        pub base_delay_ms: u64,
        pub max_delay_ms: u64,
    }

    impl Default for HotreloadVars {
        fn default() -> Self {
            Self {
                ws_path: "/ws".to_string(),
                base_delay_ms: 2000,
                max_delay_ms: 30_000,
            }
        }
    }

    impl HotreloadVars {
        /// The client script with every `__BLINK_*__` placeholder filled in.
        pub fn render(&self) -> String {
            HOTRELOAD_JS
                .replace("__BLINK_WS_PATH__", &self.ws_path)
                .replace("__BLINK_BASE_DELAY_MS__", &self.base_delay_ms.to_string())
                .replace("__BLINK_MAX_DELAY_MS__", &self.max_delay_ms.to_string())
        }
    }
}
