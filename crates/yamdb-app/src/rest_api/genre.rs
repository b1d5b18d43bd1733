#[allow(unused_imports)]
use yamdb_dal::genre::{CreateGenre, Genre, GenreRepository};

crate::slug_api!(Genre, "Genres", Genres);
