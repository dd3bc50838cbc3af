//! Portal page profiles and URL classification.

/// Which kind of portal page a profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalKind {
    /// Single sign-on page (`isign.dgist.ac.kr`).
    Isign,
    /// Main authentication login page (`auth.dgist.ac.kr/login`).
    Auth,
    /// Email one-time-code verification page.
    TwoFactor,
}

impl PortalKind {
    pub fn is_two_factor(self) -> bool {
        matches!(self, PortalKind::TwoFactor)
    }
}

/// Element locators for the logical roles on a portal page.
///
/// Login pages use the credential fields, the two-factor page uses the
/// code fields. Unused roles stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelectors {
    pub username: Option<String>,
    pub password: Option<String>,
    pub submit_button: Option<String>,
    pub remember_checkbox: Option<String>,
    pub request_code_button: Option<String>,
    pub code_input: Option<String>,
    pub confirm_button: Option<String>,
    /// Fallback form when the submit button is not inside a `<form>`.
    pub form: Option<String>,
    /// Banner the portal uses to report login failures.
    pub error_banner: Option<String>,
}

/// A named portal page variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProfile {
    pub kind: PortalKind,
    /// Substring of the page address identifying this variant.
    pub match_pattern: String,
    pub selectors: FieldSelectors,
}

fn sel(s: &str) -> Option<String> {
    Some(s.to_string())
}

/// Page profiles for the DGIST portals.
pub fn default_profiles() -> Vec<PageProfile> {
    vec![
        PageProfile {
            kind: PortalKind::Isign,
            match_pattern: "isign.dgist.ac.kr/authentication".to_string(),
            selectors: FieldSelectors {
                username: sel("#id"),
                password: sel("#pw"),
                submit_button: sel("#btn-login"),
                error_banner: sel("div.alertify div.ajs-content"),
                ..Default::default()
            },
        },
        PageProfile {
            kind: PortalKind::Auth,
            match_pattern: "auth.dgist.ac.kr/login".to_string(),
            selectors: FieldSelectors {
                username: sel("#loginID"),
                password: sel("#password"),
                submit_button: sel("#loginForm > div.mb-10.default.ui.tab.active > button"),
                remember_checkbox: sel("#rememberLoginID"),
                form: sel("#loginForm"),
                error_banner: sel("div.alertify div.ajs-content"),
                ..Default::default()
            },
        },
        PageProfile {
            kind: PortalKind::TwoFactor,
            match_pattern: "auth.dgist.ac.kr/login/authentication/two-factor/verification"
                .to_string(),
            selectors: FieldSelectors {
                submit_button: sel(
                    "body > div.body > div.wrap.container > div.contents > div.field > div.input.light > button",
                ),
                request_code_button: sel("#alert_btn"),
                code_input: sel("#code"),
                confirm_button: sel("#alert_btn"),
                ..Default::default()
            },
        },
    ]
}

/// Picks the profile whose pattern occurs in `address`, preferring the
/// longest pattern. Equal-length matches resolve to the earliest profile.
pub fn classify<'a>(address: &str, profiles: &'a [PageProfile]) -> Option<&'a PageProfile> {
    let mut best: Option<&PageProfile> = None;
    for profile in profiles {
        if profile.match_pattern.is_empty() || !address.contains(&profile.match_pattern) {
            continue;
        }
        let longer = best.map_or(true, |b| profile.match_pattern.len() > b.match_pattern.len());
        if longer {
            best = Some(profile);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(kind: PortalKind, pattern: &str) -> PageProfile {
        PageProfile {
            kind,
            match_pattern: pattern.to_string(),
            selectors: FieldSelectors::default(),
        }
    }

    #[test]
    fn two_factor_path_beats_generic_login_prefix() {
        let profiles = default_profiles();
        let page = classify(
            "https://auth.dgist.ac.kr/login/authentication/two-factor/verification?x=1",
            &profiles,
        )
        .map(|p| p.kind);
        assert_eq!(page, Some(PortalKind::TwoFactor));

        let page = classify("https://auth.dgist.ac.kr/login?redirect=/", &profiles).map(|p| p.kind);
        assert_eq!(page, Some(PortalKind::Auth));
    }

    #[test]
    fn longest_match_wins_regardless_of_order() {
        let profiles = vec![
            profile(PortalKind::TwoFactor, "a.com/login/2fa"),
            profile(PortalKind::Isign, "a.com"),
            profile(PortalKind::Auth, "a.com/login"),
        ];
        for rotation in 0..profiles.len() {
            let mut rotated = profiles.clone();
            rotated.rotate_left(rotation);
            assert_eq!(
                classify("https://a.com/login/2fa/step", &rotated).map(|p| p.kind),
                Some(PortalKind::TwoFactor)
            );
            assert_eq!(
                classify("https://a.com/login", &rotated).map(|p| p.kind),
                Some(PortalKind::Auth)
            );
        }
    }

    #[test]
    fn ties_resolve_to_first_profile() {
        let profiles = vec![
            profile(PortalKind::Auth, "x.org/a"),
            profile(PortalKind::Isign, "x.org/a"),
        ];
        assert_eq!(
            classify("https://x.org/a", &profiles).map(|p| p.kind),
            Some(PortalKind::Auth)
        );
    }

    #[test]
    fn no_match_returns_none() {
        let profiles = default_profiles();
        assert!(classify("https://portal.dgist.ac.kr/home", &profiles).is_none());
        assert!(classify("", &profiles).is_none());
    }
}
