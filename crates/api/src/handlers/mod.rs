pub mod dispatches;
pub mod health;
pub mod items;
pub mod planning;
pub mod statistics;

/// 分页参数换算，page 从 1 开始
pub(crate) fn page_to_limit_offset(page: Option<i64>, page_size: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(20).clamp(1, 200);
    (page, page_size, (page - 1) * page_size)
}
