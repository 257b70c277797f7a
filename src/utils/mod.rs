pub(crate) mod async_task;

pub(crate) mod time;

#[cfg(test)]
mod utils_test;
