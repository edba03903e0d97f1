//! Call Memoization
//!
//! Wraps a deterministic computation so each distinct call runs once. Results
//! live in the child cache named after the computation's identity.
//!
//! The call key is `(identity, description, args, kwargs)`, where `kwargs`
//! omits the excluded names. Changing the description (e.g. the doc text of
//! the computation) therefore starts a fresh set of results.
//!
//! # Example
//!
//! ```
//! use memoria::{CacheConfig, Kwargs, TieredCache};
//!
//! let cache = TieredCache::new(CacheConfig::memory_only()).unwrap();
//! let square = cache
//!     .memoize("square", |x: &u64, _: &Kwargs| x * x)
//!     .unwrap()
//!     .describe("square of x");
//!
//! let first: u64 = square.call(12, Kwargs::new()).unwrap();
//! let second: u64 = square.call(12, Kwargs::new()).unwrap();
//! assert_eq!(first, second);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::canonical;
use crate::error::{Error, Result};
use crate::tiered::TieredCache;

/// Keyword arguments of a memoized call, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Kwargs(BTreeMap<String, Value>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument
    ///
    /// Fails for values without a canonical JSON form, such as NaN floats or
    /// maps keyed by non-strings, since those could collide with other values.
    pub fn with(mut self, name: impl Into<String>, value: impl Serialize) -> Result<Self> {
        let value = canonical::to_value(&value)?;
        self.0.insert(name.into(), value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn without(&self, excluded: &BTreeSet<String>) -> Kwargs {
        Kwargs(
            self.0
                .iter()
                .filter(|(name, _)| !excluded.contains(*name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }
}

#[derive(Serialize)]
struct CallKey<'a, A: Serialize> {
    identity: &'a str,
    description: Option<&'a str>,
    args: &'a A,
    kwargs: Kwargs,
}

/// A computation whose results are cached per call
pub struct Memoized<F> {
    cache: Arc<TieredCache>,
    identity: String,
    description: Option<String>,
    excluded: BTreeSet<String>,
    function: F,
}

impl<F> Memoized<F> {
    /// Stable text describing the computation's behavior, part of every key
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Keyword arguments that never influence the selected result
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    /// The child cache holding this computation's results
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// Run the computation for `args`, or return the stored result of an earlier equal call
    pub fn call<A, R>(&self, args: A, kwargs: Kwargs) -> Result<R>
    where
        F: Fn(&A, &Kwargs) -> R,
        A: Serialize,
        R: Serialize + DeserializeOwned,
    {
        let key = CallKey {
            identity: &self.identity,
            description: self.description.as_deref(),
            args: &args,
            kwargs: kwargs.without(&self.excluded),
        };

        match self.cache.get(&key) {
            Ok(result) => {
                trace!("{}: cached result", self.identity);
                return Ok(result);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let result = (self.function)(&args, &kwargs);
        self.cache.set(&key, &result)?;
        trace!("{}: computed and stored result", self.identity);
        Ok(result)
    }
}

impl TieredCache {
    /// Memoize `function` in the child cache named `identity`
    pub fn memoize<F>(&self, identity: &str, function: F) -> Result<Memoized<F>> {
        if identity.is_empty() {
            return Err(Error::InvalidConfiguration(
                "memoized computations need a non-empty identity".into(),
            ));
        }
        Ok(Memoized {
            cache: self.child(identity)?,
            identity: identity.to_string(),
            description: None,
            excluded: BTreeSet::new(),
            function,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
