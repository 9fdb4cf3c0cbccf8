/// Router Module Index
///
/// Routing is split by access level. The layers that enforce each level are applied
/// to whole modules in `create_router`, so a handler can't end up on the wrong side
/// of the authentication boundary by accident.

/// Routes open to anonymous clients: health, sign-up/sign-in, the published catalogue,
/// package list and the PayOS webhook.
pub mod public;

/// Routes behind the `AuthUser` middleware. Ownership and enrollment checks happen in
/// the services.
pub mod authenticated;

/// Routes nested under `/admin`, behind the admin role check.
pub mod admin;
