//! Catalog service: book CRUD and the list query resolver
//!
//! A list request arrives as loose query pairs with several accepted
//! spellings per parameter. [`CatalogParams`] folds them into one
//! [`QueryPlan`]: either an order-preserving batch fetch by ids or a
//! filtered, sorted page.

use chrono::Utc;
use indexmap::IndexSet;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookPatch, CreateBook},
        Book, BookFilter, PageRequest, SortDirection, SortField,
    },
    repository::Repository,
};

pub const DEFAULT_PAGE_SIZE: i64 = 12;

const ID_KEYS: [&str; 6] = ["id", "ids", "id[]", "ids[]", "favorites", "favorites[]"];

/// Raw list parameters, first occurrence of each key kept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogParams {
    ids: IndexSet<String>,
    q: Option<String>,
    search: Option<String>,
    rented_by: Option<String>,
    page: Option<String>,
    page_alt: Option<String>,
    limit: Option<String>,
    limit_alt: Option<String>,
    sort: Option<String>,
    sort_alt: Option<String>,
    order: Option<String>,
    order_alt: Option<String>,
}

/// What the store will be asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    Batch(Vec<String>),
    Page { filter: BookFilter, page: PageRequest },
}

fn keep_first(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(name: &str, value: Option<&str>) -> AppResult<Option<i64>> {
    value
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| AppError::Validation(format!("Invalid {} parameter: {}", name, v)))
        })
        .transpose()
}

impl CatalogParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if ID_KEYS.contains(&key) {
                params.ids.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string),
                );
                continue;
            }
            let slot = match key {
                "q" => &mut params.q,
                "search" => &mut params.search,
                "rentedBy" => &mut params.rented_by,
                "page" => &mut params.page,
                "_page" => &mut params.page_alt,
                "limit" => &mut params.limit,
                "_limit" => &mut params.limit_alt,
                "sort" => &mut params.sort,
                "_sort" => &mut params.sort_alt,
                "order" => &mut params.order,
                "_order" => &mut params.order_alt,
                _ => continue,
            };
            keep_first(slot, value);
        }
        params
    }

    pub fn plan(&self) -> AppResult<QueryPlan> {
        if !self.ids.is_empty() {
            return Ok(QueryPlan::Batch(self.ids.iter().cloned().collect()));
        }

        let page = parse_number("page", non_blank(&self.page).or(non_blank(&self.page_alt)))?
            .unwrap_or(1)
            .max(1);
        let size = parse_number("limit", non_blank(&self.limit).or(non_blank(&self.limit_alt)))?
            .filter(|size| *size >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let sort = non_blank(&self.sort)
            .or(non_blank(&self.sort_alt))
            .map(SortField::parse)
            .unwrap_or(SortField::CreatedAt);
        let direction = non_blank(&self.order)
            .or(non_blank(&self.order_alt))
            .map(SortDirection::parse)
            .unwrap_or(SortDirection::Asc);

        let filter = if let Some(user_id) = non_blank(&self.rented_by) {
            BookFilter::RentedBy(user_id.to_string())
        } else if let Some(text) = non_blank(&self.q).or(non_blank(&self.search)) {
            BookFilter::Text(text.to_string())
        } else {
            BookFilter::All
        };

        Ok(QueryPlan::Page {
            filter,
            page: PageRequest {
                page,
                size,
                sort,
                direction,
            },
        })
    }
}

/// Navigation links of a page listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub first: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: String,
}

impl PageLinks {
    /// RFC 8288 `Link` header value
    pub fn header_value(&self) -> String {
        let mut parts = vec![format!("<{}>; rel=\"first\"", self.first)];
        if let Some(ref prev) = self.prev {
            parts.push(format!("<{}>; rel=\"prev\"", prev));
        }
        if let Some(ref next) = self.next {
            parts.push(format!("<{}>; rel=\"next\"", next));
        }
        parts.push(format!("<{}>; rel=\"last\"", self.last));
        parts.join(", ")
    }
}

/// Listing metadata carried in response headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub total: i64,
    pub content_range: String,
    pub links: Option<PageLinks>,
}

impl PageMeta {
    pub fn for_batch(found: usize) -> Self {
        let n = found as i64;
        Self {
            total: n,
            content_range: format!("items 0-{}/{}", (n - 1).max(0), n),
            links: None,
        }
    }

    pub fn for_page(request: &PageRequest, len: usize, total: i64, links_base: &str) -> Self {
        let content_range = if len == 0 {
            format!("items 0-0/{}", total)
        } else {
            let from = request.offset();
            let to = from.saturating_add(len as i64 - 1);
            format!("items {}-{}/{}", from, to, total)
        };

        let last_page = if total <= 0 {
            1
        } else {
            (total - 1) / request.size + 1
        };
        let base = format!(
            "{}/books?sort={}&order={}&limit={}",
            links_base,
            request.sort.as_str(),
            request.direction.as_str(),
            request.size
        );
        let link = |page: i64| format!("{}&page={}", base, page);

        Self {
            total,
            content_range,
            links: Some(PageLinks {
                first: link(1),
                prev: (request.page > 1).then(|| link(request.page - 1)),
                next: (request.page < last_page).then(|| link(request.page + 1)),
                last: link(last_page),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogResult {
    pub books: Vec<Book>,
    pub meta: PageMeta,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    links_base: String,
}

impl CatalogService {
    /// `links_base` prefixes the pagination links, e.g. `/api`
    pub fn new(repository: Repository, links_base: impl Into<String>) -> Self {
        Self {
            repository,
            links_base: links_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a list request into a batch or a page
    pub async fn resolve(&self, params: &CatalogParams) -> AppResult<CatalogResult> {
        match params.plan()? {
            QueryPlan::Batch(ids) => {
                let mut found = self.repository.books.find_by_ids(&ids).await?;
                let books: Vec<Book> = ids
                    .iter()
                    .filter_map(|id| {
                        found
                            .iter()
                            .position(|b| &b.id == id)
                            .map(|idx| found.swap_remove(idx))
                    })
                    .collect();

                tracing::debug!("Catalog batch: {} requested, {} found", ids.len(), books.len());
                let meta = PageMeta::for_batch(books.len());
                Ok(CatalogResult { books, meta })
            }
            QueryPlan::Page { filter, page } => {
                let (books, total) = self.repository.books.find_page(&filter, &page).await?;
                let meta = PageMeta::for_page(&page, books.len(), total, &self.links_base);
                Ok(CatalogResult { books, meta })
            }
        }
    }

    pub async fn get_book(&self, id: &str) -> AppResult<Book> {
        self.repository
            .books
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Create a catalog entry; availability always starts empty
    pub async fn create_book(&self, input: CreateBook) -> AppResult<Book> {
        let now = Utc::now();
        let id = input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let book = Book {
            id,
            title: input.title,
            author: input.author,
            year: input.year,
            image: input.image,
            description: input.description,
            rented_by: None,
            created_at: Some(input.created_at.unwrap_or(now)),
            updated_at: Some(now),
        };

        let saved = self.repository.books.save(&book).await?;
        tracing::info!("Catalog: created book id={}", saved.id);
        Ok(saved)
    }

    pub async fn update_book(&self, id: &str, patch: BookPatch) -> AppResult<Book> {
        let mut book = self.get_book(id).await?;
        patch.apply(&mut book);
        book.updated_at = Some(Utc::now());
        self.repository.books.save(&book).await
    }

    /// Removing an unknown id is a no-op
    pub async fn delete_book(&self, id: &str) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Catalog: deleted book id={}", id);
        Ok(())
    }
}
