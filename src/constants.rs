/// Constants used when canonicalizing raw candidate objects.
pub mod fields {
    /// Field names carrying the primary id, in priority order.
    pub const PRIMARY_ID_ALIASES: [&str; 2] = ["number", "hkNumber"];
    /// Field names carrying the secondary id, in priority order.
    pub const SECONDARY_ID_ALIASES: [&str; 4] =
        ["mainlandNumber", "mcNumber", "mainland", "mainland_number"];
    /// Canonical fields owned by `NumberRecord`; never copied into `extra`.
    pub const RESERVED_FIELDS: [&str; 4] = ["addedAt", "lastSeenAt", "province", "city"];
}

/// Constants used by the sequential multi-batch fetcher.
pub mod fetch {
    /// Number of upstream requests issued per category and update cycle.
    pub const DEFAULT_BATCH_COUNT: usize = 10;
    /// Pause between consecutive batch requests, in milliseconds.
    pub const DEFAULT_BATCH_DELAY_MS: u64 = 200;
    /// Per-request timeout applied to every outbound HTTP call, in seconds.
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
    /// Source id used for the ordinary category.
    pub const ORDINARY_SOURCE_ID: &str = "ordinary";
    /// Source id used for the special category.
    pub const SPECIAL_SOURCE_ID: &str = "special";
    /// Default headers attached to upstream listing requests.
    pub const DEFAULT_SOURCE_HEADERS: [(&str, &str); 4] = [
        ("Accept", "application/json, text/plain, */*"),
        ("Accept-Language", "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7"),
        ("Referer", "https://store.cuniq.com/tc/services-plan/order"),
        (
            "User-Agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
        ),
    ];
    /// Default listing endpoint for the ordinary category.
    pub const DEFAULT_ORDINARY_URL: &str = "https://store.cuniq.com/mall/betternumber/shopChooseNum?queryNum=&queryFlag=4&maxNum=160&goodsMonthPlanId=9003031&lang=1&scenesType=1&noToken=true&busType=1&contractPriceId=105900476&tenantId=2&application=1&langId=1";
    /// Default listing endpoint for the special category.
    pub const DEFAULT_SPECIAL_URL: &str = "https://store.cuniq.com/mall/betternumber/shopChooseNum?queryNum=&queryFlag=4&maxNum=160&goodsMonthPlanId=900300&lang=1&scenesType=1&noToken=true&busType=1&contractPriceId=1053103&tenantId=2&application=1&langId=1";
}

/// Constants used by location lookup and caching.
pub mod location {
    /// Number of leading secondary-id characters forming the area prefix.
    pub const AREA_PREFIX_LEN: usize = 7;
    /// Envelope `ret` value that signals a successful lookup.
    pub const LOOKUP_SUCCESS_RET: i64 = 200;
    /// Default lookup endpoint.
    pub const DEFAULT_LOOKUP_ENDPOINT: &str = "https://imobile.market.alicloudapi.com/mobile/query";
    /// Authorization scheme prefix sent with lookup requests.
    pub const APPCODE_SCHEME: &str = "APPCODE";
}

/// Constants used by blob persistence.
pub mod store {
    /// Blob key of the persisted snapshot.
    pub const SNAPSHOT_KEY: &str = "cache.json";
    /// Blob key of the persisted location map.
    pub const LOCATION_CACHE_KEY: &str = "location_cache.json";
    /// Default directory for the file-backed blob store.
    pub const DEFAULT_STORE_DIR: &str = ".number_pool";
    /// Default filename for the file-backed blob store.
    pub const DEFAULT_STORE_FILENAME: &str = "blobs.bin";
}

/// Constants used by the update trigger surface.
pub mod auth {
    /// Scheme prefix expected on the update trigger's authorization header.
    pub const BEARER_PREFIX: &str = "Bearer ";
}

/// Environment variable names read by `PoolConfig::from_env`.
pub mod env {
    /// Overrides the ordinary listing URL.
    pub const ORDINARY_URL: &str = "NUMBER_POOL_ORDINARY_URL";
    /// Overrides the special listing URL.
    pub const SPECIAL_URL: &str = "NUMBER_POOL_SPECIAL_URL";
    /// Session cookie for the ordinary source.
    pub const ORDINARY_COOKIE: &str = "NUMBER_POOL_ORDINARY_COOKIE";
    /// Session cookie for the special source.
    pub const SPECIAL_COOKIE: &str = "NUMBER_POOL_SPECIAL_COOKIE";
    /// Overrides the location lookup endpoint.
    pub const LOCATION_ENDPOINT: &str = "NUMBER_POOL_LOCATION_ENDPOINT";
    /// Credential for the location lookup service.
    pub const LOCATION_APP_CODE: &str = "NUMBER_POOL_LOCATION_APP_CODE";
    /// Bearer token expected by the update trigger.
    pub const UPDATE_TOKEN: &str = "NUMBER_POOL_UPDATE_TOKEN";
    /// Path of the file-backed blob store.
    pub const STORE_PATH: &str = "NUMBER_POOL_STORE_PATH";
    /// Sequential requests per category and cycle.
    pub const BATCH_COUNT: &str = "NUMBER_POOL_BATCH_COUNT";
    /// Pause between requests, in milliseconds.
    pub const BATCH_DELAY_MS: &str = "NUMBER_POOL_BATCH_DELAY_MS";
}
