// ============================================================================
// Bag Domain - staging carts that feed checkout
// ============================================================================

pub mod store;
pub mod value_objects;

pub use store::BagStore;
pub use value_objects::*;
