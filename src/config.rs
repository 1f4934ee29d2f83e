pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub test_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1997),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:babble.db?mode=rwc".to_string()),
            test_mode: std::env::var("BABBLE_TEST_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}
