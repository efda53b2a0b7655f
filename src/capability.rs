//! Capability flags and chat route selection
//!
//! A conversation carries two toggles:
//! - Deep thinking: routes to the reasoning chat endpoint
//! - Online search: routes to the search endpoint
//!
//! At most one is honored per request. Online search wins when both are set.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single capability toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Deep thinking (reasoning model endpoint)
    DeepThink,
    /// Online search endpoint
    OnlineSearch,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeepThink => write!(f, "deep-think"),
            Self::OnlineSearch => write!(f, "online-search"),
        }
    }
}

impl Capability {
    /// Parse a capability name
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::capability::Capability;
    ///
    /// assert_eq!(Capability::parse_str("think").unwrap(), Capability::DeepThink);
    /// assert_eq!(Capability::parse_str("search").unwrap(), Capability::OnlineSearch);
    /// ```
    pub fn parse_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "think" | "deep-think" | "deepthink" => Ok(Self::DeepThink),
            "search" | "online-search" | "onlinesearch" => Ok(Self::OnlineSearch),
            other => Err(format!("Unknown capability: {}", other)),
        }
    }

    /// Get a user-friendly description of this capability
    pub fn description(&self) -> &'static str {
        match self {
            Self::DeepThink => "Reason through the question before answering",
            Self::OnlineSearch => "Search the web for up-to-date information",
        }
    }
}

/// Per-conversation capability flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Deep thinking enabled
    #[serde(default)]
    pub deep_think: bool,
    /// Online search enabled
    #[serde(default)]
    pub online_search: bool,
}

impl Capabilities {
    /// Create capability flags
    pub fn new(deep_think: bool, online_search: bool) -> Self {
        Self {
            deep_think,
            online_search,
        }
    }

    /// Flip one capability and return its new state
    pub fn toggle(&mut self, capability: Capability) -> bool {
        let flag = self.flag_mut(capability);
        *flag = !*flag;
        *flag
    }

    /// Set one capability explicitly
    pub fn set(&mut self, capability: Capability, enabled: bool) {
        *self.flag_mut(capability) = enabled;
    }

    fn flag_mut(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::DeepThink => &mut self.deep_think,
            Capability::OnlineSearch => &mut self.online_search,
        }
    }

    /// Resolve which chat route these flags select
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::capability::{Capabilities, ChatRoute};
    ///
    /// assert_eq!(Capabilities::new(true, true).route(), ChatRoute::OnlineSearch);
    /// assert_eq!(Capabilities::new(true, false).route(), ChatRoute::DeepThink);
    /// assert_eq!(Capabilities::default().route(), ChatRoute::Default);
    /// ```
    pub fn route(&self) -> ChatRoute {
        if self.online_search {
            ChatRoute::OnlineSearch
        } else if self.deep_think {
            ChatRoute::DeepThink
        } else {
            ChatRoute::Default
        }
    }

    /// Colored prompt tag for the active route
    pub fn colored_tag(&self) -> String {
        match self.route() {
            ChatRoute::Default => format!("[{}]", "CHAT".cyan()),
            ChatRoute::DeepThink => format!("[{}]", "THINK".purple()),
            ChatRoute::OnlineSearch => format!("[{}]", "SEARCH".blue()),
        }
    }
}

/// Upstream streaming route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRoute {
    /// `POST {chat_base}/chat` with `model`/`chatId` headers
    Default,
    /// `POST {api_base}/deep-thinking/chat` with `model`/`chatId` headers
    DeepThink,
    /// `POST {api_base}/search` without custom headers
    OnlineSearch,
}

impl ChatRoute {
    /// Path appended to the route's base URL
    pub fn path(&self) -> &'static str {
        match self {
            Self::Default => "/chat",
            Self::DeepThink => "/deep-thinking/chat",
            Self::OnlineSearch => "/search",
        }
    }

    /// Whether the route carries the `model` and `chatId` headers
    pub fn sends_chat_headers(&self) -> bool {
        !matches!(self, Self::OnlineSearch)
    }
}

impl fmt::Display for ChatRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "chat"),
            Self::DeepThink => write!(f, "deep-thinking"),
            Self::OnlineSearch => write!(f, "search"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_search_takes_priority() {
        let caps = Capabilities::new(true, true);
        assert_eq!(caps.route(), ChatRoute::OnlineSearch);
        assert!(!caps.route().sends_chat_headers());
    }

    #[test]
    fn test_default_route() {
        let route = Capabilities::default().route();
        assert_eq!(route, ChatRoute::Default);
        assert_eq!(route.path(), "/chat");
        assert!(route.sends_chat_headers());
    }

    #[test]
    fn test_deep_think_route() {
        let route = Capabilities::new(true, false).route();
        assert_eq!(route.path(), "/deep-thinking/chat");
        assert!(route.sends_chat_headers());
    }

    #[test]
    fn test_toggle_flips_only_one_flag() {
        let mut caps = Capabilities::default();
        assert!(caps.toggle(Capability::DeepThink));
        assert!(caps.deep_think);
        assert!(!caps.online_search);
        assert!(!caps.toggle(Capability::DeepThink));
        assert!(!caps.deep_think);
    }

    #[test]
    fn test_set_capability() {
        let mut caps = Capabilities::default();
        caps.set(Capability::OnlineSearch, true);
        assert!(caps.online_search);
        caps.set(Capability::OnlineSearch, false);
        assert!(!caps.online_search);
    }

    #[test]
    fn test_parse_capability_invalid() {
        assert!(Capability::parse_str("vision").is_err());
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::DeepThink.to_string(), "deep-think");
        assert_eq!(ChatRoute::OnlineSearch.to_string(), "search");
    }
}
