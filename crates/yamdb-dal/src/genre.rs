use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Genre {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateGenre {
    #[garde(length(min = 1, max = 50))]
    pub name: String,
    #[garde(length(min = 1, max = 50), pattern(r"^[-a-zA-Z0-9_]+$"))]
    pub slug: String,
}

slug_repository!(
    Genre,
    CreateGenre,
    GenreRepository,
    GenreRepositoryImpl,
    "genre",
    "Genre"
);
