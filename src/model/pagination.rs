use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::Serialize;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 1000;

/// Page selection for listing endpoints, taken from the `page_num` and
/// `page_size` query parameters. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    /// Returns `None` if the page number is zero or the size is out of range.
    pub fn new(page_num: usize, page_size: usize) -> Option<Self> {
        if page_num == 0 || page_size == 0 || page_size > MAX_PAGE_SIZE {
            return None;
        }
        Some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        ((self.page_num - 1) * self.page_size) as u64
    }

    pub fn result(self, total: u64) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = match req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) => page_num,
            Err(_) => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let page_size = match req
            .query_value::<usize>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            Ok(page_size) => page_size,
            Err(_) => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Failure((Status::BadRequest, ())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationResult {
    page_num: usize,
    page_size: usize,
    total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_skips_nothing() {
        assert_eq!(Pagination::default().skip(), 0);
        assert_eq!(Pagination::new(1, 10).unwrap().skip(), 0);
    }

    #[test]
    fn later_pages_skip_earlier_ones() {
        assert_eq!(Pagination::new(3, 25).unwrap().skip(), 50);
    }

    #[test]
    fn reject_out_of_range() {
        assert_eq!(Pagination::new(0, 10), None);
        assert_eq!(Pagination::new(1, 0), None);
        assert_eq!(Pagination::new(1, MAX_PAGE_SIZE + 1), None);
    }
}
