mod pool;

pub use pool::RedisPool;
