// Route handlers in three security tiers:
// public (no auth) → protected (JWT + tenant + employee) → elevated (root JWT)

pub mod elevated;
pub mod protected;
pub mod public;
