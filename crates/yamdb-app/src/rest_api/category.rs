#[allow(unused_imports)]
use yamdb_dal::category::{Category, CategoryRepository, CreateCategory};

crate::slug_api!(Category, "Categories", Categories);
