//! Chain registry.
//!
//! Maps a chain identifier to its resolution family. Built once from
//! configuration and threaded into whatever needs routing; an
//! unrecognized chain yields `None` and the caller decides how loudly
//! to fail.

use std::collections::HashMap;

use common::config::ChainConfig;
use common::types::ChainFamily;

#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    families: HashMap<String, ChainFamily>,
}

impl ChainRegistry {
    pub fn from_chains(chains: &[ChainConfig]) -> Self {
        let families = chains
            .iter()
            .filter_map(|c| parse_family(&c.family).map(|f| (c.id.clone(), f)))
            .collect();
        Self { families }
    }

    pub fn family(&self, chain: &str) -> Option<ChainFamily> {
        self.families.get(chain).copied()
    }
}

fn parse_family(raw: &str) -> Option<ChainFamily> {
    match raw {
        "evm" => Some(ChainFamily::Evm),
        "other" => Some(ChainFamily::Other),
        _ => None,
    }
}
