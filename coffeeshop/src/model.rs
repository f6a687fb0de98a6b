//! Drinks, their recipes, and the shapes in which they are read and written
//!
//! A [`Drink`] serializes to its long form, which includes every
//! ingredient's name. [`ShortDrink`] is the public projection that omits
//! ingredient names.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identifier assigned to a drink when it is created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrinkId(i64);

impl DrinkId {
    /// Wraps a raw row identifier
    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw row identifier
    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for DrinkId {
    #[inline]
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DrinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One ingredient of a recipe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeItem {
    /// Ingredient label
    pub name: String,
    /// Display color
    pub color: String,
    /// Relative proportion, always positive
    pub parts: u32,
}

/// An ingredient as shown in the public listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShortRecipeItem {
    /// Display color
    pub color: String,
    /// Relative proportion
    pub parts: u32,
}

/// A recipe was rejected
#[derive(Debug, Error)]
pub enum RecipeError {
    /// An ingredient is missing a field or has one of the wrong type
    #[error("{0}")]
    Shape(#[source] serde_json::Error),

    /// The recipe is neither an ingredient nor a list of them
    #[error("recipe must be an ingredient or a list of ingredients.")]
    NotIngredients,

    /// The recipe has no ingredients
    #[error("recipe must contain at least one ingredient.")]
    Empty,

    /// An ingredient has zero or negative parts
    #[error("parts must be a positive integer.")]
    NonPositiveParts,
}

/// A non-empty, ordered list of ingredients
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RecipeItem>")]
pub struct Recipe(Vec<RecipeItem>);

impl Recipe {
    /// Validates a list of ingredients
    ///
    /// # Errors
    ///
    /// Fails if the list is empty or any ingredient has zero parts.
    pub fn new(items: Vec<RecipeItem>) -> Result<Self, RecipeError> {
        if items.is_empty() {
            return Err(RecipeError::Empty);
        }

        if items.iter().any(|item| item.parts == 0) {
            return Err(RecipeError::NonPositiveParts);
        }

        Ok(Self(items))
    }

    /// Reads a recipe supplied by a client
    ///
    /// Accepts either a list of ingredients or a single ingredient object,
    /// which becomes a one-item recipe.
    ///
    /// # Errors
    ///
    /// Fails if the value is not shaped like ingredients, or if the
    /// resulting recipe is invalid.
    pub fn from_input(value: Value) -> Result<Self, RecipeError> {
        let inputs: Vec<IngredientInput> = match value {
            Value::Array(_) => from_value(value)?,
            Value::Object(_) => vec![from_value(value)?],
            _ => return Err(RecipeError::NotIngredients),
        };

        let items = inputs
            .into_iter()
            .map(|input| {
                let parts = u32::try_from(input.parts)
                    .ok()
                    .filter(|&parts| parts > 0)
                    .ok_or(RecipeError::NonPositiveParts)?;

                Ok(RecipeItem {
                    name: input.name,
                    color: input.color,
                    parts,
                })
            })
            .collect::<Result<Vec<_>, RecipeError>>()?;

        Self::new(items)
    }

    /// The ingredients, in order
    #[inline]
    pub fn items(&self) -> &[RecipeItem] {
        &self.0
    }

    /// The ingredients without their names
    pub fn short(&self) -> Vec<ShortRecipeItem> {
        self.0
            .iter()
            .map(|item| ShortRecipeItem {
                color: item.color.clone(),
                parts: item.parts,
            })
            .collect()
    }
}

impl TryFrom<Vec<RecipeItem>> for Recipe {
    type Error = RecipeError;

    #[inline]
    fn try_from(items: Vec<RecipeItem>) -> Result<Self, Self::Error> {
        Self::new(items)
    }
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, RecipeError> {
    serde_json::from_value(value).map_err(RecipeError::Shape)
}

#[derive(Deserialize)]
struct IngredientInput {
    name: String,
    color: String,
    parts: i64,
}

/// A stored drink, serialized in its long form
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Drink {
    /// Identifier
    pub id: DrinkId,
    /// Unique title
    pub title: String,
    /// Ingredients, in order
    pub recipe: Recipe,
}

impl Drink {
    /// The public projection of this drink
    pub fn short(&self) -> ShortDrink {
        ShortDrink {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.short(),
        }
    }
}

/// A drink as shown in the public listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShortDrink {
    /// Identifier
    pub id: DrinkId,
    /// Unique title
    pub title: String,
    /// Ingredients without their names
    pub recipe: Vec<ShortRecipeItem>,
}

/// A JSON member that may be absent, explicitly `null`, or set
///
/// Use with `#[serde(default)]` so that an omitted member is [`Absent`](Self::Absent).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Presence<T> {
    /// The member was not sent
    #[default]
    Absent,
    /// The member was sent as `null`
    Null,
    /// The member was sent with a value
    Value(T),
}

impl<T> Presence<T> {
    /// Whether the member was sent at all
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The value, treating `null` like an omitted member
    #[inline]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Absent | Self::Null => None,
        }
    }
}

impl<'de, T> Deserialize<'de> for Presence<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Value))
    }
}

/// Client input was rejected
#[derive(Debug, Error)]
pub enum InputError {
    /// A new drink was sent without a title or a recipe
    #[error("Missing input field(s). (title and recipe are required.)")]
    MissingFields,

    /// A new drink was sent with a blank title
    #[error("Bad input field(s). (title must not be blank.)")]
    BlankTitle,

    /// A change was sent with neither a title nor a recipe
    #[error("Missing input field(s). (title or recipe must be supplied.)")]
    NothingToChange,

    /// A change was sent with a blank or `null` title or recipe
    #[error("Bad input field(s). (title or recipe must not be blank.)")]
    BlankChange,

    /// The recipe was rejected
    #[error("Malformed recipe. ({0})")]
    Recipe(#[from] RecipeError),
}

/// The body of a request that creates or changes a drink
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DrinkInput {
    /// The requested title
    #[serde(default)]
    pub title: Presence<String>,
    /// The requested recipe, as sent
    #[serde(default)]
    pub recipe: Presence<Value>,
}

/// A validated request to create a drink
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDrink {
    /// Title for the new drink
    pub title: String,
    /// Recipe for the new drink
    pub recipe: Recipe,
}

/// A validated request to change a drink
///
/// At least one field is set. Unset fields are left as they are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrinkPatch {
    /// Replacement title
    pub title: Option<String>,
    /// Replacement recipe
    pub recipe: Option<Recipe>,
}

impl DrinkInput {
    /// Validates the input as a new drink
    ///
    /// # Errors
    ///
    /// Fails if either field is missing, the title is blank, or the recipe
    /// is malformed.
    pub fn into_new_drink(self) -> Result<NewDrink, InputError> {
        let (Some(title), Some(recipe)) = (self.title.into_option(), self.recipe.into_option())
        else {
            return Err(InputError::MissingFields);
        };

        if title.trim().is_empty() {
            return Err(InputError::BlankTitle);
        }

        Ok(NewDrink {
            title,
            recipe: Recipe::from_input(recipe)?,
        })
    }

    /// Validates the input as a change to an existing drink
    ///
    /// # Errors
    ///
    /// Fails if neither field is sent, a sent field is `null` or blank, or
    /// the recipe is malformed.
    pub fn into_patch(self) -> Result<DrinkPatch, InputError> {
        if self.title.is_absent() && self.recipe.is_absent() {
            return Err(InputError::NothingToChange);
        }

        let title = match self.title {
            Presence::Absent => None,
            Presence::Value(title) if !title.trim().is_empty() => Some(title),
            Presence::Null | Presence::Value(_) => return Err(InputError::BlankChange),
        };

        let recipe = match self.recipe {
            Presence::Absent => None,
            Presence::Null => return Err(InputError::BlankChange),
            Presence::Value(Value::String(s)) if s.trim().is_empty() => {
                return Err(InputError::BlankChange)
            }
            Presence::Value(recipe) => Some(Recipe::from_input(recipe)?),
        };

        Ok(DrinkPatch { title, recipe })
    }
}
