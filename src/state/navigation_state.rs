/// Navigation state definitions for a single browsing session
///
/// One navigation attempt moves `Idle -> Navigating` and then settles in
/// `ContentReady`, `ChallengeDetected` or `Failed`.
use std::fmt;

/// Represents where the browsing session is within a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NavigationState {
    /// No navigation has been issued yet
    #[default]
    Idle,

    /// A page load has been issued and is settling
    Navigating,

    /// The page rendered and is ready for capture
    ContentReady,

    /// A bot-verification interstitial is showing; being polled
    ChallengeDetected,

    /// The attempt failed (transient or fatal)
    Failed,
}

impl NavigationState {
    /// Checks whether moving from this state to `next` is allowed
    ///
    /// A challenge always ends in `ContentReady` (resolved or given up on) or
    /// `Failed` (the session went away while polling). Any settled state can
    /// start a new navigation.
    pub fn can_transition_to(&self, next: NavigationState) -> bool {
        use NavigationState::*;
        match (self, next) {
            (Idle, Navigating) => true,
            (Navigating, ContentReady | ChallengeDetected | Failed) => true,
            (ChallengeDetected, ContentReady | Failed) => true,
            (ContentReady | Failed, Navigating) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::ContentReady => "content_ready",
            Self::ChallengeDetected => "challenge_detected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
