use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("ECOLESYNC_ENDPOINT")
            && !endpoint.trim().is_empty()
        {
            self.rpc.endpoint = endpoint.trim().to_string();
        }

        if let Ok(db_path) = std::env::var("ECOLESYNC_DB_PATH")
            && !db_path.trim().is_empty()
        {
            self.queue.db_path = Some(db_path);
        }

        if let Ok(principal) = std::env::var("ECOLESYNC_PRINCIPAL")
            && !principal.trim().is_empty()
        {
            self.principal = Some(principal.trim().to_string());
        }
    }
}
