//! Entry point for ingredient data and recipe prices.
//!
//! - Single-recipe reads go straight through the retrying fetcher and fall
//!   back to a client-side join against the raw store when they come back empty.
//! - Batch reads go through the request coalescer.
//! - Computed prices are kept in memory per recipe until invalidated.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::api::{BatchLines, FetchError, HttpIngredientApi, IngredientApi, IngredientStore};
use super::coalescer::RequestCoalescer;
use super::retry::{FetchOutcome, FetchStatus, RetryingFetcher};
use crate::domain::{
    calculate_recipe_price, CostingError, Ingredient, IngredientId, PriceData, Recipe, RecipeId,
    RecipeIngredientLine,
};
use crate::util::config::FetchConfig;

pub type PriceResult = Result<Option<PriceData>, CostingError>;

/// Cached prices plus per-recipe generations. A price computed from a fetch
/// is only kept if the recipe was not invalidated while the fetch ran.
#[derive(Default)]
struct PriceCache {
    entries: HashMap<RecipeId, PriceData>,
    generations: HashMap<RecipeId, u64>,
    epoch: u64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Generation {
    epoch: u64,
    recipe: u64,
}

impl PriceCache {
    fn generation(&self, recipe_id: &str) -> Generation {
        Generation {
            epoch: self.epoch,
            recipe: self.generations.get(recipe_id).copied().unwrap_or_default(),
        }
    }

    fn invalidate(&mut self, recipe_id: &str) -> bool {
        *self.generations.entry(recipe_id.to_string()).or_default() += 1;
        self.entries.remove(recipe_id).is_some()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.generations.clear();
        self.epoch += 1;
    }

    fn insert_if_current(&mut self, recipe_id: &str, seen: Generation, price: &PriceData) -> bool {
        if self.generation(recipe_id) != seen {
            return false;
        }
        self.entries.insert(recipe_id.to_string(), price.clone());
        true
    }
}

#[derive(Clone)]
pub struct IngredientFetchFacade {
    fetcher: RetryingFetcher,
    coalescer: RequestCoalescer,
    store: Option<Arc<dyn IngredientStore>>,
    fallback_timeout: Duration,
    prices: Arc<Mutex<PriceCache>>,
}

impl IngredientFetchFacade {
    pub fn new(api: Arc<dyn IngredientApi>, config: &FetchConfig) -> Self {
        let fetcher = RetryingFetcher::new(api, config);
        Self {
            coalescer: RequestCoalescer::new(fetcher.clone()),
            fetcher,
            store: None,
            fallback_timeout: config.single_timeout(),
            prices: Arc::new(Mutex::new(PriceCache::default())),
        }
    }

    /// HTTP-backed facade that also uses the HTTP store for the fallback join.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let http = Arc::new(HttpIngredientApi::new(config)?);
        Ok(Self::new(http.clone(), config).with_store(http))
    }

    pub fn with_store(mut self, store: Arc<dyn IngredientStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn coalescer(&self) -> &RequestCoalescer {
        &self.coalescer
    }

    /// Ingredient lines for one recipe. Never fails: an exhausted fetch yields
    /// an empty, degraded outcome.
    pub async fn fetch_recipe_ingredients(
        &self,
        recipe_id: &str,
    ) -> FetchOutcome<Vec<RecipeIngredientLine>> {
        let outcome = self.fetcher.fetch_single(recipe_id).await;
        if !outcome.data.is_empty() {
            self.evict(recipe_id);
            return outcome;
        }

        let Some(store) = self.store.as_ref() else {
            return outcome;
        };

        debug!(recipe_id, "primary endpoint returned no rows, joining from store");
        let joined = tokio::time::timeout(self.fallback_timeout, client_join(store.as_ref(), recipe_id))
            .await
            .unwrap_or(Err(FetchError::Timeout));

        match joined {
            Ok(lines) => {
                if !lines.is_empty() {
                    self.evict(recipe_id);
                }
                FetchOutcome::fresh(lines)
            }
            Err(error) => {
                warn!(recipe_id, error = %error, "fallback ingredient join failed");
                match outcome.status {
                    FetchStatus::Degraded(_) => outcome,
                    FetchStatus::Fresh => FetchOutcome::degraded(error.kind()),
                }
            }
        }
    }

    /// Ingredient lines for several recipes, de-duplicated against concurrent
    /// requests. Every requested id has an entry in the result.
    pub async fn fetch_batch_recipe_ingredients(
        &self,
        recipe_ids: &[RecipeId],
    ) -> FetchOutcome<BatchLines> {
        let mut outcome = self.coalescer.fetch_batch(recipe_ids).await;
        if !outcome.is_degraded() {
            for (recipe_id, lines) in &outcome.data {
                if !lines.is_empty() {
                    self.evict(recipe_id);
                }
            }
        }
        for recipe_id in recipe_ids {
            outcome.data.entry(recipe_id.clone()).or_default();
        }
        outcome
    }

    pub fn calculate_recipe_price(
        &self,
        recipe: &Recipe,
        lines: &[RecipeIngredientLine],
    ) -> PriceResult {
        calculate_recipe_price(recipe, lines)
    }

    /// Price for one recipe, served from memory when available. Prices built
    /// from a degraded fetch, or from a fetch that raced an invalidation, are
    /// returned but not kept.
    pub async fn recipe_price(&self, recipe: &Recipe) -> PriceResult {
        let seen = {
            let prices = self.prices.lock();
            if let Some(cached) = prices.entries.get(&recipe.id) {
                debug!(recipe_id = %recipe.id, "serving cached recipe price");
                return Ok(Some(cached.clone()));
            }
            prices.generation(&recipe.id)
        };

        let outcome = self.fetch_recipe_ingredients(&recipe.id).await;
        let price = calculate_recipe_price(recipe, &outcome.data)?;
        if !outcome.is_degraded() {
            self.store_price(&recipe.id, seen, price.as_ref());
        }
        Ok(price)
    }

    /// Prices for several recipes, fetching every uncached one in a single
    /// coalesced batch.
    pub async fn recipe_prices(&self, recipes: &[Recipe]) -> HashMap<RecipeId, PriceResult> {
        let mut results = HashMap::with_capacity(recipes.len());
        let mut missing = Vec::new();

        {
            let prices = self.prices.lock();
            for recipe in recipes {
                match prices.entries.get(&recipe.id) {
                    Some(cached) => {
                        results.insert(recipe.id.clone(), Ok(Some(cached.clone())));
                    }
                    None => missing.push((recipe, prices.generation(&recipe.id))),
                }
            }
        }

        if missing.is_empty() {
            return results;
        }

        let ids: Vec<RecipeId> = missing.iter().map(|(recipe, _)| recipe.id.clone()).collect();
        let outcome = self.fetch_batch_recipe_ingredients(&ids).await;

        for (recipe, seen) in missing {
            let lines = outcome
                .data
                .get(&recipe.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let price = calculate_recipe_price(recipe, lines);
            if let (Ok(price), false) = (&price, outcome.is_degraded()) {
                self.store_price(&recipe.id, seen, price.as_ref());
            }
            results.insert(recipe.id.clone(), price);
        }

        results
    }

    pub fn cached_price(&self, recipe_id: &str) -> Option<PriceData> {
        self.prices.lock().entries.get(recipe_id).cloned()
    }

    /// Drops the cached price for a recipe, e.g. after one of its ingredients
    /// changed cost. Prices from fetches already in flight are not cached.
    pub fn invalidate_recipe(&self, recipe_id: &str) {
        if self.prices.lock().invalidate(recipe_id) {
            debug!(recipe_id, "invalidated cached recipe price");
        }
    }

    pub fn clear_cache(&self) {
        self.prices.lock().clear();
    }

    /// Drops a cached price superseded by freshly fetched rows.
    fn evict(&self, recipe_id: &str) {
        if self.prices.lock().entries.remove(recipe_id).is_some() {
            debug!(recipe_id, "fresh rows replaced cached recipe price");
        }
    }

    fn store_price(&self, recipe_id: &str, seen: Generation, price: Option<&PriceData>) {
        let Some(price) = price else {
            return;
        };
        if !self.prices.lock().insert_if_current(recipe_id, seen, price) {
            debug!(recipe_id, "recipe invalidated during fetch, not caching price");
        }
    }
}

/// Rebuilds recipe lines from the raw store, attaching each line's ingredient
/// by `ingredient_id`.
async fn client_join(
    store: &dyn IngredientStore,
    recipe_id: &str,
) -> Result<Vec<RecipeIngredientLine>, FetchError> {
    let lines = store.recipe_lines(recipe_id).await?;
    if lines.is_empty() {
        return Ok(lines);
    }

    let ids: Vec<IngredientId> = lines
        .iter()
        .map(|line| line.ingredient_id.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let ingredients: HashMap<IngredientId, Ingredient> = store
        .ingredients_by_id(&ids)
        .await?
        .into_iter()
        .map(|ingredient| (ingredient.id.clone(), ingredient))
        .collect();

    let joined: Vec<RecipeIngredientLine> = lines
        .into_iter()
        .map(|line| match ingredients.get(&line.ingredient_id) {
            Some(ingredient) => line.with_ingredient(ingredient.clone()),
            None => line,
        })
        .collect();

    let unmatched = joined.iter().filter(|line| line.ingredient.is_none()).count();
    if unmatched > 0 {
        warn!(recipe_id, unmatched, "recipe lines reference unknown ingredients");
    }

    Ok(joined)
}
