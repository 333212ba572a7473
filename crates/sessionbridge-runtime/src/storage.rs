use std::sync::Arc;

use sessionbridge_adapters::CookieJar;
use sessionbridge_api::SessionStorage;
use sessionbridge_cookie::{CookieOptions, join_chunks};

/// [`SessionStorage`] backed by a request's cookie jar.
///
/// Values are read by reassembling chunked cookies and written through the jar's
/// filter-then-append path, so repeated writes leave one logical cookie per key.
pub struct CookieStorage<J: ?Sized> {
    jar: Arc<J>,
    options: CookieOptions,
}

impl<J: CookieJar + ?Sized> CookieStorage<J> {
    pub fn new(jar: Arc<J>, options: CookieOptions) -> Self {
        Self { jar, options }
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }
}

impl<J: CookieJar + ?Sized> SessionStorage for CookieStorage<J> {
    fn get_item(&self, key: &str) -> Option<String> {
        join_chunks(key, |name| self.jar.get_cookie(name))
    }

    fn set_item(&self, key: &str, value: &str) {
        self.jar.set_cookie(key, value, &self.options);
    }

    fn remove_item(&self, key: &str) {
        self.jar.set_cookie(key, "", &self.options);
    }
}
