// This file is part of soroban-indexer.
// Copyright (C) 2025 Blockroma
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::env;

const CONFIG_FILE: &str = "CONFIG_FILE";

/// Extension methods for "configuration structs" which can be deserialized.
pub trait ConfigExt
where
    Self: for<'de> Deserialize<'de>,
{
    /// Load the configuration from the file at the value of the `CONFIG_FILE` environment variable
    /// or `config.yaml` by default, with an overlay provided by environment variables prefixed
    /// with `"APP__"` and split/nested via `"__"`.
    fn load() -> Result<Self, Box<figment::Error>> {
        let config_file = env::var(CONFIG_FILE)
            .map(Yaml::file_exact)
            .unwrap_or(Yaml::file_exact("config.yaml"));

        let config = Figment::new()
            .merge(config_file)
            .merge(Env::prefixed("APP__").split("__"))
            .extract()?;

        Ok(config)
    }
}

impl<T> ConfigExt for T where T: for<'de> Deserialize<'de> {}

#[cfg(test)]
mod tests {
    use crate::config::{CONFIG_FILE, ConfigExt};
    use assert_matches::assert_matches;
    use serde::Deserialize;
    use std::{env, fs};

    #[test]
    fn test_load() {
        let config_file = env::temp_dir().join("soroban-indexer-config-test.yaml");
        fs::write(&config_file, "rpc:\n  url: http://file:8000\n").unwrap();

        unsafe {
            env::set_var(CONFIG_FILE, &config_file);
            env::set_var("APP__RPC__URL", "http://env:8000");
        }

        // The environment overlay wins over the file.
        let config = Config::load();
        assert_matches!(
            config,
            Ok(Config { rpc: rpc::Config { url } }) if url == "http://env:8000"
        );
    }

    #[derive(Debug, Clone, Deserialize)]
    struct Config {
        rpc: rpc::Config,
    }

    mod rpc {
        use serde::Deserialize;

        #[derive(Debug, Clone, Deserialize)]
        pub struct Config {
            pub url: String,
        }
    }
}
