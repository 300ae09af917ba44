mod common;
mod rate_limit;
mod routing;
