//! Maps dashboard paths to the view they show.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    Ads,
    Templates,
    Contacts,
    Segments,
    Campaigns,
    Deliveries,
    Plans,
    Agenda,
    Login,
    NotFound,
}

impl Route {
    /// Resolve a path such as `/contacts/?q=ana`. Query, fragment and
    /// trailing slashes are ignored; matching is case-insensitive.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/').to_ascii_lowercase();
        match path.as_str() {
            "" | "/dashboard" => Self::Dashboard,
            "/ads" => Self::Ads,
            "/templates" => Self::Templates,
            "/contacts" => Self::Contacts,
            "/segments" => Self::Segments,
            "/campaigns" => Self::Campaigns,
            "/deliveries" | "/queue" => Self::Deliveries,
            "/plans" | "/plan" | "/billing" => Self::Plans,
            "/agenda" | "/appointments" => Self::Agenda,
            "/login" => Self::Login,
            _ => Self::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/",
            Self::Ads => "/ads",
            Self::Templates => "/templates",
            Self::Contacts => "/contacts",
            Self::Segments => "/segments",
            Self::Campaigns => "/campaigns",
            Self::Deliveries => "/deliveries",
            Self::Plans => "/plans",
            Self::Agenda => "/agenda",
            Self::Login => "/login",
            Self::NotFound => "/404",
        }
    }

    pub fn requires_auth(self) -> bool {
        !matches!(self, Self::Login | Self::NotFound)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_paths() {
        assert_eq!(Route::from_path("/"), Route::Dashboard);
        assert_eq!(Route::from_path(""), Route::Dashboard);
        assert_eq!(Route::from_path("/Contacts/?q=ana"), Route::Contacts);
        assert_eq!(Route::from_path("/plan#pro"), Route::Plans);
        assert_eq!(Route::from_path("/agenda"), Route::Agenda);
        assert_eq!(Route::from_path("/ads/12"), Route::NotFound);
        assert!(!Route::Login.requires_auth());
        assert!(Route::Deliveries.requires_auth());
    }

    #[test]
    fn path_round_trips() {
        for route in [Route::Ads, Route::Templates, Route::Segments, Route::Campaigns, Route::Plans, Route::Login] {
            assert_eq!(Route::from_path(route.path()), route);
        }
    }
}
