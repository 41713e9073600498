//! Heuristic detection of authentication / setup gates.
//!
//! A blocker screen is one that autonomous exploration is unlikely to get
//! past without credentials or manual setup. Detection is by activity name
//! only; [`NavigationGraph::mark_as_blocker`](crate::NavigationGraph::mark_as_blocker)
//! covers everything the heuristic misses.

/// Lowercase activity-name fragments that indicate a blocker screen.
pub const BLOCKER_ACTIVITY_PATTERNS: &[&str] = &[
    "password",
    "login",
    "signin",
    "sign_in",
    "auth",
    "otp",
    "2fa",
    "twofactor",
    "setup",
    "register",
    "signup",
    "sign_up",
    "forgot",
    "accountpicker",
    "account_picker",
    "chooseaccount",
    "choose_account",
    "accountselect",
    "account_select",
    "selectaccount",
];

/// True if the activity name contains any blocker fragment, case-insensitively.
pub fn is_blocker_activity(activity: &str) -> bool {
    let lower = activity.to_lowercase();
    BLOCKER_ACTIVITY_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_common_gates() {
        assert!(is_blocker_activity("com.shop.auth.LoginActivity"));
        assert!(is_blocker_activity("com.shop.SignInActivity"));
        assert!(is_blocker_activity(".ForgotPasswordActivity"));
        assert!(is_blocker_activity(".OtpVerification"));
        assert!(is_blocker_activity(".Setup2FAActivity"));
        assert!(is_blocker_activity("com.google.android.gms.common.account.AccountPickerActivity"));
        assert!(is_blocker_activity(".RegisterActivity"));
    }

    #[test]
    fn test_ignores_ordinary_screens() {
        assert!(!is_blocker_activity("com.shop.MainActivity"));
        assert!(!is_blocker_activity(".ProductDetailActivity"));
        assert!(!is_blocker_activity(".CartActivity"));
    }
}
