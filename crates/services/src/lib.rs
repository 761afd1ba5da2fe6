pub mod services;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
