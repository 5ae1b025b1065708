/*!
 * Gateway
 * =======
 *
 * Entry point for every proxied request. The path is matched against the
 * backend's route table and the request is handed to the matching flow:
 *
 *     VideoStream     STRM redirect decision (see `videos`)
 *     PlaybackInfo    proxied, response rewritten by PlaybackInfoMutator
 *     BaseHtmlPlayer  proxied, response rewritten by BaseHtmlPlayerMutator
 *     Subtitles       proxied, response rewritten by SubtitleMutator
 *     (no match)      proxied untouched
 */

pub mod mutators;
pub mod videos;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use tracing::{debug, info};

use crate::config::{Config, MediaServerKind};
use crate::errors::AppResult;
use crate::media_server::{create_adapter, MediaServerAdapter};
use crate::playback::PolicySettings;
use crate::proxy::{serve_with_mutator, UpstreamProxy};
use crate::redirect::RedirectResolver;
use crate::routing::{RouteAction, RouteTable};
use crate::services::ItemLock;
use crate::storage::StorageRegistry;
use crate::streaming::StrmClassifier;

use mutators::{BaseHtmlPlayerMutator, PlaybackInfoMutator, SubtitleMutator};

pub struct Gateway {
    adapter: Arc<dyn MediaServerAdapter>,
    routes: RouteTable,
    proxy: UpstreamProxy,
    classifier: Arc<StrmClassifier>,
    resolver: RedirectResolver,
    storage: StorageRegistry,
    locks: ItemLock,
    playback_info: PlaybackInfoMutator,
    base_html_player: BaseHtmlPlayerMutator,
    subtitles: SubtitleMutator,
}

impl Gateway {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let adapter = create_adapter(&config.media_server)?;
        let routes = RouteTable::build(adapter.route_patterns(), config)?;
        let proxy = UpstreamProxy::new(adapter.upstream_addr())?;
        let classifier = Arc::new(StrmClassifier::from_config(
            &config.http_strm,
            &config.alist_strm,
        ));
        let resolver = RedirectResolver::new(&config.redirect)?;
        let storage = StorageRegistry::from_config(
            &config.alist_strm,
            crate::config::defaults::DEFAULT_STORAGE_TIMEOUT,
        )?;

        let settings = PolicySettings {
            http_transcode: config.http_strm.transcode,
            alist_transcode: config.alist_strm.transcode,
        };
        let playback_info =
            PlaybackInfoMutator::new(adapter.clone(), classifier.clone(), storage.clone(), settings);

        info!(
            backend = adapter.kind().as_str(),
            upstream = %adapter.upstream_addr(),
            routes = routes.len(),
            strm_rules = classifier.len(),
            storage_endpoints = storage.len(),
            "Gateway initialised"
        );

        Ok(Self {
            adapter,
            routes,
            proxy,
            classifier,
            resolver,
            storage,
            locks: ItemLock::new(),
            playback_info,
            base_html_player: BaseHtmlPlayerMutator,
            subtitles: SubtitleMutator::new(config.subtitle.ass_style.clone()),
        })
    }

    pub fn kind(&self) -> MediaServerKind {
        self.adapter.kind()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn locks(&self) -> &ItemLock {
        &self.locks
    }

    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let action = self
            .routes
            .match_path(request.uri().path())
            .map(|rule| rule.action());

        let Some(action) = action else {
            return self.proxy.forward(request).await;
        };
        debug!(path = %request.uri().path(), action = action.name(), "Route matched");

        match action {
            RouteAction::VideoStream => videos::handle(self, request).await,
            RouteAction::PlaybackInfo => {
                serve_with_mutator(&self.proxy, &self.playback_info, request).await
            }
            RouteAction::BaseHtmlPlayer => {
                serve_with_mutator(&self.proxy, &self.base_html_player, request).await
            }
            RouteAction::Subtitles => {
                serve_with_mutator(&self.proxy, &self.subtitles, request).await
            }
        }
    }
}
