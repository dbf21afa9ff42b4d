mod helpers;
mod tests_lifecycle;
