pub fn now_ms() -> i64 {
    tillbase_types::time::now_ms()
}
