// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with its value objects, rules and
// the handler that persists its changes. Pricing is a pure rule shared by
// the storefront and checkout.
//
// ============================================================================

pub mod bag;
pub mod order;
pub mod pricing;
