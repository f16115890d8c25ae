#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use recipe_costing::domain::{Ingredient, IngredientId, Recipe, RecipeId, RecipeIngredientLine};
use recipe_costing::infra::{BatchLines, FetchError, IngredientApi, IngredientStore};
use recipe_costing::util::telemetry::init_tracing;
use recipe_costing::FetchConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type SingleResponse = Result<Vec<RecipeIngredientLine>, FetchError>;
type BatchResponder = Box<dyn Fn(&[RecipeId]) -> Result<BatchLines, FetchError> + Send + Sync>;

/// Ingredient endpoint double with scripted answers and call counters.
pub struct FakeApi {
    delay: Duration,
    single_script: Mutex<VecDeque<SingleResponse>>,
    single_default: SingleResponse,
    batch: BatchResponder,
    single_calls: AtomicUsize,
    batch_calls: Mutex<Vec<Vec<RecipeId>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            single_script: Mutex::new(VecDeque::new()),
            single_default: Ok(Vec::new()),
            batch: Box::new(|ids| {
                Ok(ids
                    .iter()
                    .map(|id| (id.clone(), vec![mince_line(id, dec!(200))]))
                    .collect())
            }),
            single_calls: AtomicUsize::new(0),
            batch_calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call waits this long (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers for the first single-recipe calls, in order.
    pub fn with_single_script(self, responses: Vec<SingleResponse>) -> Self {
        *self.single_script.lock() = responses.into();
        self
    }

    /// Answer once the script has run out.
    pub fn with_single_default(mut self, response: SingleResponse) -> Self {
        self.single_default = response;
        self
    }

    pub fn with_batch<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[RecipeId]) -> Result<BatchLines, FetchError> + Send + Sync + 'static,
    {
        self.batch = Box::new(responder);
        self
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> Vec<Vec<RecipeId>> {
        self.batch_calls.lock().clone()
    }
}

#[async_trait]
impl IngredientApi for FakeApi {
    async fn recipe_ingredients(
        &self,
        _recipe_id: &str,
    ) -> Result<Vec<RecipeIngredientLine>, FetchError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .single_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.single_default.clone());
        tokio::time::sleep(self.delay).await;
        response
    }

    async fn batch_recipe_ingredients(
        &self,
        recipe_ids: &[RecipeId],
    ) -> Result<BatchLines, FetchError> {
        self.batch_calls.lock().push(recipe_ids.to_vec());
        tokio::time::sleep(self.delay).await;
        (self.batch)(recipe_ids)
    }
}

/// Raw-table double for the fallback join.
pub struct FakeStore {
    lines: HashMap<RecipeId, Vec<RecipeIngredientLine>>,
    ingredients: Vec<Ingredient>,
    failure: Option<FetchError>,
    delay: Duration,
    pub line_calls: AtomicUsize,
    pub ingredient_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new(lines: HashMap<RecipeId, Vec<RecipeIngredientLine>>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            lines,
            ingredients,
            failure: None,
            delay: Duration::ZERO,
            line_calls: AtomicUsize::new(0),
            ingredient_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(HashMap::new(), Vec::new())
        }
    }

    /// Raw line reads wait this long (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl IngredientStore for FakeStore {
    async fn recipe_lines(
        &self,
        recipe_id: &str,
    ) -> Result<Vec<RecipeIngredientLine>, FetchError> {
        self.line_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.lines.get(recipe_id).cloned().unwrap_or_default())
    }

    async fn ingredients_by_id(&self, ids: &[IngredientId]) -> Result<Vec<Ingredient>, FetchError> {
        self.ingredient_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .ingredients
            .iter()
            .filter(|ingredient| ids.contains(&ingredient.id))
            .cloned()
            .collect())
    }
}

pub fn setup() {
    init_tracing();
}

pub fn ids(raw: &[&str]) -> Vec<RecipeId> {
    raw.iter().map(|id| id.to_string()).collect()
}

pub fn config() -> FetchConfig {
    FetchConfig::default()
}

pub fn api(fake: FakeApi) -> Arc<FakeApi> {
    Arc::new(fake)
}

/// 10 per kg, 10% trim waste, 80% cooked yield.
pub fn mince() -> Ingredient {
    Ingredient {
        id: "mince".to_string(),
        ingredient_name: "Beef mince".to_string(),
        cost_per_unit: dec!(10),
        unit: "kg".to_string(),
        trim_peel_waste_percentage: dec!(10),
        yield_percentage: dec!(80),
    }
}

pub fn mince_line(recipe_id: &str, grams: Decimal) -> RecipeIngredientLine {
    RecipeIngredientLine {
        id: format!("{recipe_id}-mince"),
        recipe_id: recipe_id.to_string(),
        ingredient_id: "mince".to_string(),
        quantity: grams,
        unit: "g".to_string(),
        ingredient: Some(mince()),
    }
}

pub fn recipe(id: &str, servings: Decimal) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: format!("Recipe {id}"),
        yield_amount: servings,
        yield_unit: Some("portions".to_string()),
    }
}
