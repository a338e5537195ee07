//! Minesweeper route table - Reference workload.
//!
//! Mounts the game's pages on a worker router so the game keeps working with
//! the server unreachable:
//! - `GET /` the page shell with a loading placeholder
//! - `GET /newGameForm.html` the settings form, seeded from the cookie
//! - `GET /newGame.html` a new board; the chosen settings go into the cookie
//! - `POST /reveal.html` the board after revealing the selected cell

mod game;

use std::sync::Arc;

use worker_sdk::prelude::*;
use worker_sdk::worker_core::CookieConfig;

pub use game::*;

/// Mount the game routes on `router`.
pub fn mount<'a>(router: &'a Router, game: Arc<dyn Game>, cookie: &CookieConfig) -> &'a Router {
    let routes = Arc::new(GameRoutes {
        game,
        cookie_name: cookie.name.clone(),
        max_age: cookie.max_age,
    });

    let index = routes.clone();
    let form = routes.clone();
    let new_game = routes.clone();
    let reveal = routes;
    router
        .get("/", move |_req, res, _next| {
            let routes = index.clone();
            async move { routes.index(res) }
        })
        .get("/newGameForm.html", move |req, res, _next| {
            let routes = form.clone();
            async move { routes.new_game_form(&req, res) }
        })
        .get("/newGame.html", move |req, res, _next| {
            let routes = new_game.clone();
            async move { routes.new_game(&req, res).await }
        })
        .post("/reveal.html", move |req, res, _next| {
            let routes = reveal.clone();
            async move { routes.reveal(&req, res) }
        })
}

struct GameRoutes {
    game: Arc<dyn Game>,
    cookie_name: String,
    max_age: u64,
}

impl GameRoutes {
    fn saved_settings(&self, req: &PseudoRequest) -> GameSettings {
        let cookie = req.cookies().get(&self.cookie_name).map(String::as_str);
        GameSettings::from_cookie(cookie, self.game.defaults())
    }

    fn index(&self, res: PseudoResponse) -> Result<Finalized, RouteError> {
        // The form needs the cookie, which may not have arrived yet.
        Ok(res.send(self.game.page(&self.game.loading_form())))
    }

    fn new_game_form(&self, req: &PseudoRequest, res: PseudoResponse) -> Result<Finalized, RouteError> {
        Ok(res.send(self.game.new_game_form(&self.saved_settings(req))))
    }

    async fn new_game(&self, req: &PseudoRequest, mut res: PseudoResponse) -> Result<Finalized, RouteError> {
        let settings = GameSettings::from_query(req.query(), self.game.defaults());
        res.cookie(
            &self.cookie_name,
            settings.to_cookie()?,
            CookieOptions::max_age(self.max_age),
        )
        .await?;
        Ok(res.send(self.game.new_game(&settings)))
    }

    fn reveal(&self, req: &PseudoRequest, res: PseudoResponse) -> Result<Finalized, RouteError> {
        let body = req.body();
        let cells = body
            .get("grid__cell")
            .map(FormValue::values)
            .unwrap_or_default();
        let selected = body
            .get("selected")
            .ok_or(GameError::NothingSelected)?
            .as_single()
            .ok_or(GameError::MultipleSelected)?;
        Ok(res.send(self.game.reveal(cells, selected)?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use worker_sdk::worker_bridge::CookieBridge;
    use worker_sdk::worker_cache::CacheGeneration;
    use worker_sdk::worker_core::memory::{MemoryClient, MemoryHost};
    use worker_sdk::worker_core::BackgroundMessage;
    use worker_sdk::worker_router::DispatchContext;

    const DEFAULTS: GameSettings = GameSettings {
        rows: 10,
        cols: 10,
        mines: 10,
    };

    /// Renders its inputs so tests can see what the routes passed through.
    #[derive(Default)]
    struct FakeGame {
        revealed: Mutex<Vec<(Vec<String>, String)>>,
    }

    impl Game for FakeGame {
        fn defaults(&self) -> GameSettings {
            DEFAULTS
        }

        fn page(&self, contents: &str) -> String {
            format!("<main>{}</main>", contents)
        }

        fn loading_form(&self) -> String {
            "loading".to_string()
        }

        fn new_game_form(&self, s: &GameSettings) -> String {
            format!("form {}x{} {}", s.rows, s.cols, s.mines)
        }

        fn new_game(&self, s: &GameSettings) -> String {
            format!("board {}x{} {}", s.rows, s.cols, s.mines)
        }

        fn reveal(&self, cells: &[String], selected: &str) -> Result<String, GameError> {
            if selected == "bad" {
                return Err(GameError::InvalidCell(selected.to_string()));
            }
            self.revealed
                .lock()
                .unwrap()
                .push((cells.to_vec(), selected.to_string()));
            Ok(format!("revealed {} of {}", selected, cells.len()))
        }
    }

    struct Fixture {
        router: Router,
        game: Arc<FakeGame>,
        ctx: DispatchContext,
        page: Arc<MemoryClient>,
    }

    fn fixture(cookie: Option<&str>) -> Fixture {
        let host = MemoryHost::new();
        let page = host.clients.open("tab-1");
        let bridge = Arc::new(CookieBridge::new("minesweeper", Duration::from_millis(1000)));
        bridge.set(cookie.map(str::to_string));
        let ctx = DispatchContext::new(
            Scope::default(),
            bridge,
            CacheStore::new(
                Arc::new(MemoryCacheBackend::new()),
                CacheGeneration::new("test", "1"),
            ),
            host.host(),
        );

        let game = Arc::new(FakeGame::default());
        let router = Router::new();
        mount(&router, game.clone(), &CookieConfig::default());
        Fixture {
            router,
            game,
            ctx,
            page,
        }
    }

    async fn fetch(f: &Fixture, request: Request) -> Response {
        let (event, rx) = FetchEvent::new(request);
        f.router.dispatch(event.with_client("tab-1"), &f.ctx).await;
        rx.recv().await.unwrap()
    }

    fn get(path: &str) -> Request {
        Request::get(&format!("http://localhost:3003{}", path)).unwrap()
    }

    fn reveal(form: &str) -> Request {
        Request::post("http://localhost:3003/reveal.html")
            .unwrap()
            .with_form(form)
    }

    // === Mount Tests ===

    #[test]
    fn test_mount_registers_game_routes() {
        let f = fixture(None);
        let routes: Vec<String> = f.router.matchers().iter().map(|m| m.to_string()).collect();

        assert_eq!(
            routes,
            vec![
                "GET /",
                "GET /newGameForm.html",
                "GET /newGame.html",
                "POST /reveal.html"
            ]
        );
    }

    // === Page Tests ===

    #[tokio::test]
    async fn test_index_renders_loading_shell() {
        let f = fixture(None);
        let response = fetch(&f, get("/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "<main>loading</main>");
    }

    #[tokio::test]
    async fn test_new_game_form_uses_cookie() {
        let f = fixture(Some(r#"{"rows":5,"cols":6,"mines":7}"#));
        let response = fetch(&f, get("/newGameForm.html")).await;

        assert_eq!(response.text(), "form 5x6 7");
    }

    #[tokio::test]
    async fn test_new_game_form_defaults_without_cookie() {
        let f = fixture(None);
        assert_eq!(fetch(&f, get("/newGameForm.html")).await.text(), "form 10x10 10");
    }

    #[tokio::test]
    async fn test_new_game_form_defaults_on_garbage_cookie() {
        let f = fixture(Some("not json"));
        assert_eq!(fetch(&f, get("/newGameForm.html")).await.text(), "form 10x10 10");
    }

    // === New Game Tests ===

    #[tokio::test]
    async fn test_new_game_persists_settings() {
        let f = fixture(None);
        let response = fetch(&f, get("/newGame.html?rows=4&cols=5&mines=3")).await;

        assert_eq!(response.text(), "board 4x5 3");
        assert_eq!(
            f.ctx.bridge.current().as_deref(),
            Some(r#"{"rows":4,"cols":5,"mines":3}"#)
        );
        assert_eq!(
            f.page.messages(),
            vec![BackgroundMessage::SetCookie {
                cookie_name: "minesweeper".to_string(),
                cookie_value: r#"{"rows":4,"cols":5,"mines":3}"#.to_string(),
                options: CookieOptions::max_age(CookieConfig::default().max_age),
            }]
        );
    }

    #[tokio::test]
    async fn test_new_game_then_form_sees_new_settings() {
        let f = fixture(None);
        fetch(&f, get("/newGame.html?rows=8&cols=8&mines=2")).await;

        assert_eq!(fetch(&f, get("/newGameForm.html")).await.text(), "form 8x8 2");
    }

    // === Reveal Tests ===

    #[tokio::test]
    async fn test_reveal_coalesces_cells() {
        let f = fixture(None);
        let response = fetch(&f, reveal("grid__cell=a&grid__cell=b&selected=a")).await;

        assert_eq!(response.text(), "revealed a of 2");
        assert_eq!(
            f.game.revealed.lock().unwrap().as_slice(),
            &[(vec!["a".to_string(), "b".to_string()], "a".to_string())]
        );
    }

    #[tokio::test]
    async fn test_reveal_single_cell_is_a_list() {
        let f = fixture(None);
        let response = fetch(&f, reveal("grid__cell=a&selected=a")).await;

        assert_eq!(response.text(), "revealed a of 1");
    }

    #[tokio::test]
    async fn test_reveal_multiple_selected_fails() {
        let f = fixture(None);
        let response = fetch(&f, reveal("grid__cell=a&selected=a&selected=b")).await;

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(f.game.revealed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reveal_without_selected_fails() {
        let f = fixture(None);
        let response = fetch(&f, reveal("grid__cell=a")).await;

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_reveal_game_error_fails() {
        let f = fixture(None);
        let response = fetch(&f, reveal("grid__cell=a&selected=bad")).await;

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
