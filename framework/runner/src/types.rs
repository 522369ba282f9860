/// Recommended error type for your scenario `main` function. Configuration errors returned by the
/// runner convert into it so you can use `?` to propagate them.
pub type LoadlineResult<T> = anyhow::Result<T>;
