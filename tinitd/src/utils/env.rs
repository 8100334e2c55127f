//! Configuration from the environment.

use std::collections::HashMap;

const ENV_PREFIX: &str = "TINIT_";

/// Read every `TINIT_`-prefixed variable into a map. The prefix is
/// dropped, keys are lowercased and underscores become dots, so
/// `TINIT_LOG_DIR=/x` turns up as `log.dir=/x`.
pub fn daemon_env() -> HashMap<String, String> {
    let mut env = HashMap::new();
    for (key, value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key = stripped.to_lowercase().replace('_', ".");
        env.insert(key, value);
    }
    env
}
