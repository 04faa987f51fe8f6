pub mod api;
pub mod core;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("scroll_harvest_rust"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // 已初始化过时忽略
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}
