use crate::error::Result;
use crate::io::{read_json, write_json};
use crate::sources::LayeredLookup;
use itertools::Itertools;
use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// PMID→year sources, lowest precedence first. PubMed Central is authoritative.
pub const SOURCES: [&str; 4] = ["Eur", "NLM", "EBI", "PMC"];
pub const EBI_SOURCE: &str = "EBI";
pub const EBI_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// Year part of a `YYYY-MM-DD` date.
pub fn year_from_date(date: &str) -> Option<i32> {
    date.split('-').next().and_then(|y| y.trim().parse::<i32>().ok())
}

fn year_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

/// Normalizes one raw source cache to years, discarding values that do not parse.
pub fn normalize_source(source: &str, raw: BTreeMap<String, Value>) -> BTreeMap<String, i32> {
    let total = raw.len();
    let years: BTreeMap<String, i32> = raw
        .into_iter()
        .filter_map(|(pmid, value)| {
            let year = if source == EBI_SOURCE {
                value.as_str().and_then(year_from_date)
            } else {
                year_from_value(&value)
            };
            year.map(|y| (pmid, y))
        })
        .collect();
    if years.len() < total {
        warn!("{}: {} of {} values are not years and were discarded", source, total - years.len(), total);
    }
    years
}

/// Stacks the per-source year maps in precedence order.
pub fn merge_sources(sources: Vec<(String, BTreeMap<String, i32>)>) -> LayeredLookup<i32> {
    let mut lookup = LayeredLookup::new();
    for (name, years) in sources.into_iter() {
        lookup.push_layer(name, years);
    }
    for (name, count) in lookup.contributions() {
        info!("PMID years contributed by {}: {}", name, count);
    }
    lookup
}

/// Loads every source cache at the path `path_for` gives it. Missing caches become empty layers.
pub fn load_sources<F: Fn(&str) -> path::PathBuf>(path_for: F) -> Result<Vec<(String, BTreeMap<String, i32>)>> {
    let mut sources = vec![];
    for source in SOURCES.iter() {
        let path = path_for(source);
        let years = if path.exists() {
            let raw: BTreeMap<String, Value> = read_json(&path)?;
            normalize_source(source, raw)
        } else {
            warn!("no PMID year cache for {} at {:?}", source, path);
            BTreeMap::new()
        };
        sources.push((source.to_string(), years));
    }
    Ok(sources)
}

/// Converts the merged string-keyed map into numeric PMIDs.
pub fn pmid_years(merged: BTreeMap<String, i32>) -> BTreeMap<u64, i32> {
    merged.into_iter().filter_map(|(pmid, year)| pmid.trim().parse::<u64>().ok().map(|p| (p, year))).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbiSearchResponse {
    #[serde(rename = "resultList")]
    pub result_list: EbiResultList,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EbiResultList {
    #[serde(default)]
    pub result: Vec<EbiResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EbiResult {
    #[serde(rename = "firstPublicationDate")]
    pub first_publication_date: Option<String>,
}

impl EbiSearchResponse {
    /// The oldest first-publication date among all results.
    pub fn earliest_date(&self) -> Option<String> {
        self.result_list.result.iter().filter_map(|r| r.first_publication_date.clone()).min()
    }
}

/// Outcome of one Europe PMC lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// A response arrived. `None` means it carried no usable date.
    Recorded(Option<String>),
    /// The request failed in transit and should be retried on the next run.
    Unresolved(String),
}

pub fn parse_response(body: &str) -> Option<String> {
    serde_json::from_str::<EbiSearchResponse>(body).ok().and_then(|r| r.earliest_date())
}

async fn lookup_pmid(client: &reqwest::Client, base_url: &str, pmid: &str) -> Lookup {
    let url = format!("{}?query=ext_id:{}%20src:med&format=json", base_url, pmid);
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return Lookup::Unresolved(e.to_string()),
    };
    if response.status().is_server_error() || response.status().as_u16() == 429 {
        return Lookup::Unresolved(format!("status {}", response.status()));
    }
    match response.text().await {
        Ok(body) => Lookup::Recorded(parse_response(&body)),
        Err(e) => Lookup::Unresolved(e.to_string()),
    }
}

pub type Checkpoint = BTreeMap<String, Option<String>>;

pub fn load_checkpoint(path: &path::Path) -> Result<Checkpoint> {
    if !path.exists() {
        info!("no checkpoint at {:?}, starting from scratch", path);
        return Ok(Checkpoint::new());
    }
    let checkpoint: Checkpoint = read_json(path)?;
    info!("loaded {} already requested PMIDs from {:?}", checkpoint.len(), path);
    Ok(checkpoint)
}

/// Written through a temporary sibling file, then renamed into place.
pub fn save_checkpoint(path: &path::Path, checkpoint: &Checkpoint) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    write_json(&tmp, checkpoint)?;
    std::fs::rename(&tmp, path)?;
    debug!("checkpointed {} PMIDs", checkpoint.len());
    Ok(())
}

/// PMIDs in `wanted` that no source resolves and the checkpoint has not recorded.
pub fn remaining_pmids(wanted: &[String], known: &LayeredLookup<i32>, checkpoint: &Checkpoint) -> Vec<String> {
    wanted.iter().filter(|p| !known.contains_key(p) && !checkpoint.contains_key(*p)).cloned().unique().collect_vec()
}

/// Bounded worker pool over the Europe PMC search API.
pub struct EbiFetcher {
    client: reqwest::Client,
    base_url: String,
    concurrency: usize,
    checkpoint_every: usize,
    checkpoint_path: path::PathBuf,
}

impl EbiFetcher {
    pub fn new(client: reqwest::Client, concurrency: usize, checkpoint_every: usize, checkpoint_path: path::PathBuf) -> Self {
        EbiFetcher {
            client,
            base_url: EBI_SEARCH_URL.to_string(),
            concurrency: concurrency.max(1),
            checkpoint_every: checkpoint_every.max(1),
            checkpoint_path,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Requests every PMID not yet in the checkpoint and returns the merged checkpoint.
    /// Failed requests are left out so the next run retries them.
    pub async fn fetch(&self, pmids: Vec<String>) -> Result<Checkpoint> {
        let mut checkpoint = load_checkpoint(&self.checkpoint_path)?;
        let remaining = pmids.into_iter().filter(|p| !checkpoint.contains_key(p)).collect::<BTreeSet<_>>().into_iter().collect_vec();
        info!("{} PMIDs left to request from Europe PMC", remaining.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut unresolved = 0_usize;
        for (idx, chunk) in remaining.chunks(self.checkpoint_every).enumerate() {
            let mut workers = JoinSet::new();
            for pmid in chunk.iter().cloned() {
                let client = self.client.clone();
                let base_url = self.base_url.clone();
                let semaphore = Arc::clone(&semaphore);
                workers.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let outcome = lookup_pmid(&client, &base_url, &pmid).await;
                    (pmid, outcome)
                });
            }
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((pmid, Lookup::Recorded(date))) => {
                        checkpoint.insert(pmid, date);
                    }
                    Ok((pmid, Lookup::Unresolved(reason))) => {
                        debug!("{} left unresolved: {}", pmid, reason);
                        unresolved += 1;
                    }
                    Err(e) => {
                        warn!("Europe PMC worker failed: {}", e);
                        unresolved += 1;
                    }
                }
            }
            save_checkpoint(&self.checkpoint_path, &checkpoint)?;
            info!("chunk {}: {} PMIDs recorded so far", idx, checkpoint.len());
        }
        save_checkpoint(&self.checkpoint_path, &checkpoint)?;
        if unresolved > 0 {
            warn!("{} PMIDs could not be requested and will be retried on the next run", unresolved);
        }
        Ok(checkpoint)
    }
}

/// Keeps the recorded dates, dropping PMIDs whose response carried none.
pub fn ebi_cache(checkpoint: &Checkpoint) -> BTreeMap<String, String> {
    let cache: BTreeMap<String, String> = checkpoint.iter().filter_map(|(k, v)| v.clone().map(|d| (k.clone(), d))).collect();
    info!("{} of {} requested PMIDs mapped to a date", cache.len(), checkpoint.len());
    cache
}
