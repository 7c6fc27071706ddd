//! State machine behind a comment view.
//!
//! Independent tracks share one [`CommentState`]:
//!
//! * the thread track pages through top-level comments of the active
//!   resource
//! * the floor track pages through replies to one opened comment
//! * the profile track shows the author of a comment
//!
//! Every transition replaces state atomically through a
//! [`tokio::sync::watch`] channel, so observers never see a half-applied
//! page. Each fetch carries the generation of its track at the time it was
//! issued. Switching resource, refreshing, changing sort order, closing the
//! floor or the profile bumps the generation, and responses of an older
//! generation are dropped when they arrive. Failed likes are rolled back
//! only on tracks whose generation did not move in the meantime.

use tokio::sync::watch;

use super::{
    CommentQuery, CommentService, Cursor, FloorQuery, Resource, SortType, ThreadId,
};
use crate::{
    config::Config,
    error::Result,
    protocol::{
        comment::{Comment, CommentPage},
        user::UserDetail,
    },
};

/// Top-level comments of the active resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadState {
    /// `None` until the first load.
    pub resource: Option<Resource>,
    pub sort: SortType,
    pub comments: Vec<Comment>,
    /// Pages loaded so far.
    pub page: u32,
    /// Token the server returned with the last page.
    pub cursor: Option<Cursor>,
    pub total_count: u64,
    pub has_more: bool,
    pub loading: bool,
    /// Message of the last failed fetch or like, cleared by the next
    /// successful fetch.
    pub error: Option<String>,

    generation: u64,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self {
            resource: None,
            sort: SortType::default(),
            comments: Vec::new(),
            page: 0,
            cursor: None,
            total_count: 0,
            has_more: true,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

/// Replies to one comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloorState {
    /// `None` while no floor is open.
    pub parent: Option<Comment>,
    pub comments: Vec<Comment>,
    /// Timestamp to continue from, [`FloorQuery::FIRST_PAGE`] before the
    /// first page.
    pub time: i64,
    pub pages: u32,
    pub total_count: u64,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,

    generation: u64,
}

impl Default for FloorState {
    fn default() -> Self {
        Self {
            parent: None,
            comments: Vec::new(),
            time: FloorQuery::FIRST_PAGE,
            pages: 0,
            total_count: 0,
            has_more: true,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

impl ThreadState {
    fn set_like(&mut self, comment_id: u64, liked: bool, liked_count: u64) {
        set_like(self.comments.iter_mut(), comment_id, liked, liked_count);
    }
}

impl FloorState {
    /// Fresh state one generation after `self`.
    fn next_generation(&self) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        }
    }

    /// The parent is a copy of a thread comment and is updated with it.
    fn set_like(&mut self, comment_id: u64, liked: bool, liked_count: u64) {
        let copies = self.comments.iter_mut().chain(self.parent.as_mut());
        set_like(copies, comment_id, liked, liked_count);
    }
}

/// Profile of one comment author.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileState {
    /// `None` while no profile is open.
    pub user_id: Option<u64>,
    pub detail: Option<UserDetail>,
    pub loading: bool,
    pub error: Option<String>,

    generation: u64,
}

impl ProfileState {
    /// Fresh state one generation after `self`.
    fn next_generation(&self) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentState {
    pub thread: ThreadState,
    pub floor: FloorState,
    pub profile: ProfileState,
}

impl CommentState {
    fn find(&self, comment_id: u64) -> Option<&Comment> {
        self.thread
            .comments
            .iter()
            .chain(&self.floor.comments)
            .find(|comment| comment.id == comment_id)
    }

    /// Sets the like pair of every copy of a comment: the same reply can be
    /// listed on both tracks.
    fn set_like(&mut self, comment_id: u64, liked: bool, liked_count: u64) {
        self.thread.set_like(comment_id, liked, liked_count);
        self.floor.set_like(comment_id, liked, liked_count);
    }
}

fn set_like<'a>(
    comments: impl Iterator<Item = &'a mut Comment>,
    comment_id: u64,
    liked: bool,
    liked_count: u64,
) {
    for comment in comments.filter(|comment| comment.id == comment_id) {
        comment.liked = liked;
        comment.liked_count = liked_count;
    }
}

/// A page fetch in flight.
struct PageTicket {
    generation: u64,
    query: CommentQuery,
}

/// A floor fetch in flight.
struct FloorTicket {
    generation: u64,
    query: FloorQuery,
}

/// A like in flight, with what to restore if it fails and where.
struct LikeTicket {
    resource: Resource,
    thread_generation: u64,
    floor_generation: u64,
    liked: bool,
    liked_count: u64,
}

/// Drives paging, floors and likes of comment threads.
///
/// All operations take `&self` and may run concurrently; state changes are
/// observed through [`CommentController::subscribe`].
pub struct CommentController<S> {
    service: S,
    page_size: u32,
    floor_limit: u32,
    state: watch::Sender<CommentState>,
}

impl<S> CommentController<S>
where
    S: CommentService,
{
    #[must_use]
    pub fn new(service: S, page_size: u32, floor_limit: u32) -> Self {
        Self {
            service,
            page_size: page_size.max(1),
            floor_limit: floor_limit.max(1),
            state: watch::channel(CommentState::default()).0,
        }
    }

    /// Creates a controller with the configured page sizes.
    #[must_use]
    pub fn from_config(service: S, config: &Config) -> Self {
        Self::new(service, config.comment_page_size, config.floor_limit)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CommentState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified of every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CommentState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Loads the next page of `resource`.
    ///
    /// Starts over from page 1 if `resource` is not the active resource or
    /// `refresh` is set. Otherwise does nothing while a page is loading or
    /// once the thread is exhausted.
    pub async fn load_comments(&self, resource: Resource, refresh: bool) {
        let Some(ticket) = self.begin_page(resource, refresh) else {
            return;
        };

        let page = ticket.query.page;
        let result = self.service.comments(ticket.query).await;
        self.finish_page(ticket.generation, page, result);
    }

    /// Loads the next page of the active resource, if any.
    pub async fn load_more(&self) {
        let resource = self.state.borrow().thread.resource;
        match resource {
            Some(resource) => self.load_comments(resource, false).await,
            None => debug!("no active resource to load more comments of"),
        }
    }

    /// Reloads the active resource from page 1, if any.
    pub async fn refresh(&self) {
        let resource = self.state.borrow().thread.resource;
        if let Some(resource) = resource {
            self.load_comments(resource, true).await;
        }
    }

    /// Changes the sort order, reloading the active resource if it changed.
    pub async fn set_sort(&self, sort: SortType) {
        let mut resource = None;
        let changed = self.state.send_if_modified(|state| {
            if state.thread.sort == sort {
                return false;
            }
            state.thread.sort = sort;
            resource = state.thread.resource;
            true
        });

        if !changed {
            return;
        }

        debug!("sorting comments by {sort}");
        if let Some(resource) = resource {
            self.load_comments(resource, true).await;
        }
    }

    /// Opens the replies of `parent`, replacing any open floor.
    ///
    /// Does nothing without an active resource.
    pub async fn open_floor(&self, parent: Comment) {
        let parent_id = parent.id;
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            let Some(resource) = state.thread.resource else {
                return false;
            };

            let mut floor = state.floor.next_generation();
            floor.parent = Some(parent);
            floor.loading = true;
            ticket = Some(FloorTicket {
                generation: floor.generation,
                query: self.floor_query(parent_id, resource.thread_id(), FloorQuery::FIRST_PAGE),
            });
            state.floor = floor;
            true
        });

        match ticket {
            Some(ticket) => self.fetch_floor(ticket).await,
            None => debug!("no active resource to open floor of comment {parent_id} in"),
        }
    }

    /// Loads the next page of the open floor.
    ///
    /// Does nothing while a page is loading, or once the floor is exhausted
    /// and at least one page was loaded.
    pub async fn load_floor_more(&self) {
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            let (Some(resource), Some(parent)) = (state.thread.resource, &state.floor.parent)
            else {
                return false;
            };

            let floor = &state.floor;
            if floor.loading || (!floor.has_more && floor.pages > 0) {
                return false;
            }

            let query = self.floor_query(parent.id, resource.thread_id(), floor.time);
            ticket = Some(FloorTicket {
                generation: floor.generation,
                query,
            });
            state.floor.loading = true;
            state.floor.error = None;
            true
        });

        if let Some(ticket) = ticket {
            self.fetch_floor(ticket).await;
        }
    }

    /// Discards the open floor. Reopening starts from the first page.
    pub fn close_floor(&self) {
        self.state.send_modify(|state| {
            state.floor = state.floor.next_generation();
        });
    }

    /// Likes the comment, or removes the like if it is liked.
    ///
    /// The change is shown immediately. If the service rejects it, the
    /// previous like state and count are restored and the error is set on
    /// the thread. Does nothing without an active resource or for a comment
    /// not in view.
    pub async fn toggle_like(&self, comment_id: u64) {
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            let Some(resource) = state.thread.resource else {
                return false;
            };
            let Some(comment) = state.find(comment_id) else {
                return false;
            };

            let (liked, liked_count) = (comment.liked, comment.liked_count);
            let optimistic_count = if liked {
                liked_count.saturating_sub(1)
            } else {
                liked_count.saturating_add(1)
            };
            state.set_like(comment_id, !liked, optimistic_count);
            ticket = Some(LikeTicket {
                resource,
                thread_generation: state.thread.generation,
                floor_generation: state.floor.generation,
                liked,
                liked_count,
            });
            true
        });

        let Some(ticket) = ticket else {
            debug!("comment {comment_id} is not in view, not toggling like");
            return;
        };

        let like = !ticket.liked;
        let result = self
            .service
            .like(ticket.resource.thread_id(), comment_id, like)
            .await;

        if let Err(e) = result {
            warn!(
                "failed to {} comment {comment_id}: {e}",
                if like { "like" } else { "unlike" }
            );
            self.state.send_if_modified(|state| {
                let thread_current = state.thread.generation == ticket.thread_generation;
                let floor_current = state.floor.generation == ticket.floor_generation;
                if thread_current {
                    state.thread.set_like(comment_id, ticket.liked, ticket.liked_count);
                    state.thread.error = Some(e.to_string());
                }
                if floor_current {
                    state.floor.set_like(comment_id, ticket.liked, ticket.liked_count);
                    if !thread_current {
                        state.floor.error = Some(e.to_string());
                    }
                }
                if !thread_current && !floor_current {
                    debug!("comment {comment_id} was reloaded, not restoring its like");
                }
                thread_current || floor_current
            });
        }
    }

    /// Shows the profile of `user_id`, replacing any open profile.
    ///
    /// Does nothing for user id `0`, which the service uses for deleted
    /// accounts.
    pub async fn open_profile(&self, user_id: u64) {
        if user_id == 0 {
            return;
        }

        let mut generation = 0;
        self.state.send_modify(|state| {
            let mut profile = state.profile.next_generation();
            profile.user_id = Some(user_id);
            profile.loading = true;
            generation = profile.generation;
            state.profile = profile;
        });

        let result = self.service.user_detail(user_id).await;
        self.state.send_if_modified(|state| {
            let profile = &mut state.profile;
            if profile.generation != generation {
                debug!("dropping stale profile of user {user_id}");
                return false;
            }

            profile.loading = false;
            match result {
                Ok(detail) => profile.detail = Some(detail),
                Err(e) => {
                    warn!("failed to load profile of user {user_id}: {e}");
                    profile.error = Some(e.to_string());
                }
            }
            true
        });
    }

    /// Discards the open profile.
    pub fn close_profile(&self) {
        self.state.send_modify(|state| {
            state.profile = state.profile.next_generation();
        });
    }

    fn begin_page(&self, resource: Resource, refresh: bool) -> Option<PageTicket> {
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            let thread = &mut state.thread;
            if refresh || thread.resource != Some(resource) {
                debug!("loading comments of {} sorted by {}", resource.thread_id(), thread.sort);
                *thread = ThreadState {
                    resource: Some(resource),
                    sort: thread.sort,
                    generation: thread.generation.wrapping_add(1),
                    ..ThreadState::default()
                };
                state.floor = state.floor.next_generation();
            } else if thread.loading || !thread.has_more {
                return false;
            }

            let page = thread.page + 1;
            ticket = Some(PageTicket {
                generation: thread.generation,
                query: CommentQuery {
                    thread_id: resource.thread_id(),
                    page,
                    page_size: self.page_size,
                    sort: thread.sort,
                    cursor: thread.sort.cursor(page, self.page_size, thread.cursor.as_ref()),
                },
            });
            thread.loading = true;
            thread.error = None;
            true
        });
        ticket
    }

    fn finish_page(&self, generation: u64, page: u32, result: Result<CommentPage>) {
        self.state.send_if_modified(|state| {
            let thread = &mut state.thread;
            if thread.generation != generation {
                debug!("dropping stale comment page {page}");
                return false;
            }

            thread.loading = false;
            match result {
                Ok(data) => {
                    trace!("comment page {page}: {} comments", data.comments.len());
                    thread.cursor = data.next_cursor().cloned();
                    thread.has_more = data.has_more;
                    thread.total_count = data.total_count;
                    if page <= 1 {
                        thread.comments = data.comments;
                    } else {
                        thread.comments.extend(data.comments);
                    }
                    thread.page = page;
                    thread.error = None;
                }
                Err(e) => {
                    warn!("failed to load comment page {page}: {e}");
                    thread.error = Some(e.to_string());
                }
            }
            true
        });
    }

    fn floor_query(&self, parent_comment_id: u64, thread_id: ThreadId, time: i64) -> FloorQuery {
        FloorQuery {
            parent_comment_id,
            thread_id,
            time,
            limit: self.floor_limit,
        }
    }

    async fn fetch_floor(&self, ticket: FloorTicket) {
        let parent = ticket.query.parent_comment_id;
        let result = self.service.floor(ticket.query).await;

        self.state.send_if_modified(|state| {
            let floor = &mut state.floor;
            if floor.generation != ticket.generation {
                debug!("dropping stale floor page of comment {parent}");
                return false;
            }

            floor.loading = false;
            match result {
                Ok(data) => {
                    // Without a server timestamp, continue after the last reply.
                    let last = data.comments.last().map(|comment| comment.time);
                    floor.time = data
                        .next_cursor()
                        .and_then(Cursor::as_i64)
                        .or(last)
                        .unwrap_or(floor.time);
                    floor.has_more = data.has_more;
                    floor.total_count = data.total_count;
                    if floor.pages == 0 {
                        floor.comments = data.comments;
                    } else {
                        floor.comments.extend(data.comments);
                    }
                    floor.pages += 1;
                    floor.error = None;
                }
                Err(e) => {
                    warn!("failed to load floor of comment {parent}: {e}");
                    floor.error = Some(e.to_string());
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, VecDeque},
        sync::{Arc, Mutex},
    };

    use tokio::sync::Notify;

    use super::*;
    use crate::{comments::ResourceType, error::Error, protocol::user::Profile};

    const SONG: Resource = Resource::new(ResourceType::Song, 186_016);
    const OTHER_SONG: Resource = Resource::new(ResourceType::Song, 5_257_138);

    #[derive(Default)]
    struct MockService {
        pages: Mutex<VecDeque<Result<CommentPage>>>,
        floors: Mutex<VecDeque<Result<CommentPage>>>,
        likes: Mutex<VecDeque<Result<()>>>,
        profiles: Mutex<VecDeque<Result<UserDetail>>>,

        comment_queries: Mutex<Vec<CommentQuery>>,
        floor_queries: Mutex<Vec<FloorQuery>>,
        like_calls: Mutex<Vec<(ThreadId, u64, bool)>>,
        profile_calls: Mutex<Vec<u64>>,

        /// Comment fetches of these threads wait for a notification.
        held_threads: Mutex<HashMap<ThreadId, Arc<Notify>>>,
        /// Likes wait for a notification if set.
        like_gate: Option<Arc<Notify>>,
        /// Profile fetches wait for a notification if set.
        profile_gate: Option<Arc<Notify>>,
    }

    impl MockService {
        fn push_page(&self, page: Result<CommentPage>) -> &Self {
            self.pages.lock().unwrap().push_back(page);
            self
        }

        fn push_floor(&self, page: Result<CommentPage>) -> &Self {
            self.floors.lock().unwrap().push_back(page);
            self
        }

        fn push_like(&self, result: Result<()>) -> &Self {
            self.likes.lock().unwrap().push_back(result);
            self
        }

        fn push_profile(&self, result: Result<UserDetail>) -> &Self {
            self.profiles.lock().unwrap().push_back(result);
            self
        }

        fn hold(&self, resource: Resource) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.held_threads
                .lock()
                .unwrap()
                .insert(resource.thread_id(), Arc::clone(&gate));
            gate
        }

        fn comment_queries(&self) -> Vec<CommentQuery> {
            self.comment_queries.lock().unwrap().clone()
        }

        fn floor_queries(&self) -> Vec<FloorQuery> {
            self.floor_queries.lock().unwrap().clone()
        }
    }

    impl CommentService for MockService {
        async fn comments(&self, query: CommentQuery) -> Result<CommentPage> {
            let gate = self.held_threads.lock().unwrap().get(&query.thread_id).cloned();
            let response = self.pages.lock().unwrap().pop_front();
            self.comment_queries.lock().unwrap().push(query);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            response.unwrap_or_else(|| Err(Error::internal("no page queued")))
        }

        async fn floor(&self, query: FloorQuery) -> Result<CommentPage> {
            self.floor_queries.lock().unwrap().push(query);
            let response = self.floors.lock().unwrap().pop_front();
            response.unwrap_or_else(|| Err(Error::internal("no floor queued")))
        }

        async fn like(&self, thread_id: ThreadId, comment_id: u64, like: bool) -> Result<()> {
            self.like_calls.lock().unwrap().push((thread_id, comment_id, like));
            let response = self.likes.lock().unwrap().pop_front();
            if let Some(gate) = &self.like_gate {
                gate.notified().await;
            }
            response.unwrap_or(Ok(()))
        }

        async fn user_detail(&self, user_id: u64) -> Result<UserDetail> {
            self.profile_calls.lock().unwrap().push(user_id);
            let response = self.profiles.lock().unwrap().pop_front();
            if let Some(gate) = &self.profile_gate {
                gate.notified().await;
            }
            response.unwrap_or_else(|| Err(Error::internal("no profile queued")))
        }
    }

    fn user(user_id: u64, nickname: &str) -> UserDetail {
        UserDetail {
            level: 7,
            profile: Some(Profile {
                user_id,
                nickname: nickname.to_owned(),
                ..Profile::default()
            }),
            ..UserDetail::default()
        }
    }

    fn comment(id: u64, liked_count: u64, liked: bool) -> Comment {
        Comment {
            id,
            liked_count,
            liked,
            time: 1_700_000_000_000 + i64::try_from(id).unwrap(),
            ..Comment::default()
        }
    }

    fn page(ids: &[u64], has_more: bool) -> CommentPage {
        CommentPage {
            total_count: 100,
            has_more,
            comments: ids.iter().map(|&id| comment(id, 0, false)).collect(),
            ..CommentPage::default()
        }
    }

    fn ids(comments: &[Comment]) -> Vec<u64> {
        comments.iter().map(|comment| comment.id).collect()
    }

    fn controller(service: MockService) -> CommentController<MockService> {
        CommentController::new(service, 20, 30)
    }

    #[tokio::test]
    async fn first_page_replaces_and_later_pages_append() {
        let service = MockService::default();
        service.push_page(Ok(page(&[1, 2], true))).push_page(Ok(page(&[3], true)));
        let controller = controller(service);

        controller.load_comments(SONG, false).await;
        controller.load_more().await;

        let state = controller.state();
        assert_eq!(ids(&state.thread.comments), [1, 2, 3]);
        assert_eq!(state.thread.page, 2);
        assert_eq!(state.thread.total_count, 100);
        assert!(!state.thread.loading);

        let queries = controller.service().comment_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].thread_id.as_str(), "R_SO_4_186016");
        assert_eq!((queries[0].page, queries[0].cursor.as_str()), (1, "0"));
        assert_eq!((queries[1].page, queries[1].cursor.as_str()), (2, "20"));
        assert_eq!(queries[1].sort, SortType::Recommended);
    }

    #[tokio::test]
    async fn exhausted_thread_is_not_fetched_again() {
        let service = MockService::default();
        service.push_page(Ok(page(&[1], false)));
        let controller = controller(service);

        controller.load_comments(SONG, false).await;
        controller.load_more().await;
        controller.load_comments(SONG, false).await;

        assert_eq!(controller.service().comment_queries().len(), 1);
        let state = controller.state();
        assert!(!state.thread.has_more);
        assert_eq!(ids(&state.thread.comments), [1]);
    }

    #[tokio::test]
    async fn time_order_echoes_server_cursor() {
        let service = MockService::default();
        let mut first = page(&[1], true);
        first.cursor = Some(Cursor::from("abc123"));
        service.push_page(Ok(first)).push_page(Ok(page(&[2], true)));
        let controller = controller(service);

        // No active resource yet: only stored.
        controller.set_sort(SortType::Time).await;
        assert!(controller.service().comment_queries().is_empty());

        controller.load_comments(SONG, false).await;
        controller.load_more().await;

        let queries = controller.service().comment_queries();
        assert_eq!(queries[0].cursor.as_str(), "0");
        assert_eq!(queries[1].cursor.as_str(), "abc123");
        assert_eq!(queries[1].sort, SortType::Time);
    }

    #[tokio::test]
    async fn sort_change_resets_thread() {
        let service = MockService::default();
        service
            .push_page(Ok(page(&[1], true)))
            .push_page(Ok(page(&[2], true)))
            .push_page(Ok(page(&[9], true)));
        let controller = controller(service);

        controller.load_comments(SONG, false).await;
        controller.load_more().await;
        controller.set_sort(SortType::Hot).await;
        // Unchanged sort order: no reload.
        controller.set_sort(SortType::Hot).await;

        let queries = controller.service().comment_queries();
        assert_eq!(queries.len(), 3);
        assert_eq!((queries[2].page, queries[2].cursor.as_str()), (1, "normalHot#0"));

        let state = controller.state();
        assert_eq!(ids(&state.thread.comments), [9]);
        assert_eq!(state.thread.page, 1);
        assert_eq!(state.thread.sort, SortType::Hot);
    }

    #[tokio::test]
    async fn failed_page_keeps_stale_comments() {
        let service = MockService::default();
        service
            .push_page(Ok(page(&[1], true)))
            .push_page(Err(Error::transport("connection reset")))
            .push_page(Ok(page(&[2], true)));
        let controller = controller(service);

        controller.load_comments(SONG, false).await;
        controller.load_more().await;

        let state = controller.state();
        assert_eq!(ids(&state.thread.comments), [1]);
        assert!(state.thread.error.as_deref().unwrap().contains("connection reset"));
        assert!(!state.thread.loading);
        assert!(state.floor.error.is_none());

        controller.load_more().await;
        let state = controller.state();
        assert_eq!(ids(&state.thread.comments), [1, 2]);
        assert!(state.thread.error.is_none());
        assert_eq!(controller.service().comment_queries()[2].page, 2);
    }

    #[tokio::test]
    async fn stale_page_of_previous_resource_is_dropped() {
        let service = MockService::default();
        service
            .push_page(Ok(page(&[1], true)))
            .push_page(Ok(page(&[7], true)));
        let gate = service.hold(SONG);
        let controller = controller(service);

        tokio::join!(controller.load_comments(SONG, false), async {
            controller.load_comments(OTHER_SONG, false).await;
            gate.notify_one();
        });

        let state = controller.state();
        assert_eq!(state.thread.resource, Some(OTHER_SONG));
        assert_eq!(ids(&state.thread.comments), [7]);
        assert!(!state.thread.loading);
    }

    #[tokio::test]
    async fn loading_gates_more_requests() {
        let service = MockService::default();
        service.push_page(Ok(page(&[1], true)));
        let gate = service.hold(SONG);
        let controller = controller(service);

        tokio::join!(controller.load_comments(SONG, false), async {
            assert!(controller.state().thread.loading);
            controller.load_more().await;
            gate.notify_one();
        });

        assert_eq!(controller.service().comment_queries().len(), 1);
    }

    #[tokio::test]
    async fn failed_like_restores_exact_values() {
        let gate = Arc::new(Notify::new());
        let service = MockService {
            like_gate: Some(Arc::clone(&gate)),
            ..MockService::default()
        };
        let mut first = page(&[], true);
        first.comments.push(comment(42, 5, false));
        service.push_page(Ok(first)).push_like(Err(Error::api(-460, Some("cheating"))));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;

        tokio::join!(controller.toggle_like(42), async {
            let state = controller.state();
            assert_eq!(state.thread.comments[0].liked_count, 6);
            assert!(state.thread.comments[0].liked);
            gate.notify_one();
        });

        let state = controller.state();
        assert_eq!(state.thread.comments[0].liked_count, 5);
        assert!(!state.thread.comments[0].liked);
        assert!(state.thread.error.as_deref().unwrap().contains("-460"));

        let calls = controller.service().like_calls.lock().unwrap().clone();
        assert_eq!(calls, [(SONG.thread_id(), 42, true)]);
    }

    #[tokio::test]
    async fn unlike_never_goes_below_zero() {
        let service = MockService::default();
        let mut first = page(&[], true);
        first.comments.push(comment(42, 0, true));
        service.push_page(Ok(first));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;

        controller.toggle_like(42).await;

        let state = controller.state();
        assert_eq!(state.thread.comments[0].liked_count, 0);
        assert!(!state.thread.comments[0].liked);
        assert!(state.thread.error.is_none());
        let calls = controller.service().like_calls.lock().unwrap().clone();
        assert_eq!(calls, [(SONG.thread_id(), 42, false)]);
    }

    #[tokio::test]
    async fn like_without_target_does_nothing() {
        let controller = controller(MockService::default());
        controller.toggle_like(42).await;
        assert_eq!(controller.state(), CommentState::default());

        controller.service().push_page(Ok(page(&[1], true)));
        controller.load_comments(SONG, false).await;
        let before = controller.state();
        controller.toggle_like(42).await;
        assert_eq!(controller.state(), before);
        assert!(controller.service().like_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_updates_both_tracks() {
        let service = MockService::default();
        service
            .push_page(Ok(page(&[1, 2], true)))
            .push_floor(Ok(page(&[2, 3], false)));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;
        controller.open_floor(comment(1, 0, false)).await;

        controller.toggle_like(2).await;

        let state = controller.state();
        assert!(state.thread.comments[1].liked);
        assert!(state.floor.comments[0].liked);
        assert_eq!(state.floor.comments[0].liked_count, 1);
        assert!(!state.floor.comments[1].liked);
    }

    #[tokio::test]
    async fn floor_pages_by_time_and_resets_on_close() {
        let service = MockService::default();
        let mut first = page(&[10, 11], true);
        first.time = Some(Cursor::from("1700000000011"));
        service
            .push_page(Ok(page(&[1], true)))
            .push_floor(Ok(first))
            .push_floor(Ok(page(&[12], false)))
            .push_floor(Ok(page(&[20], true)));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;

        controller.open_floor(comment(1, 0, false)).await;
        controller.load_floor_more().await;
        // Exhausted after a loaded page.
        controller.load_floor_more().await;

        let state = controller.state();
        assert_eq!(ids(&state.floor.comments), [10, 11, 12]);
        assert_eq!(state.floor.pages, 2);
        assert!(!state.floor.has_more);

        controller.close_floor();
        let state = controller.state();
        assert!(state.floor.parent.is_none());
        assert!(state.floor.comments.is_empty());
        assert_eq!(state.floor.time, FloorQuery::FIRST_PAGE);

        controller.open_floor(comment(1, 0, false)).await;
        assert_eq!(ids(&controller.state().floor.comments), [20]);

        let queries = controller.service().floor_queries();
        let times: Vec<i64> = queries.iter().map(|query| query.time).collect();
        assert_eq!(times, [-1, 1_700_000_000_011, -1]);
        assert!(queries.iter().all(|query| query.parent_comment_id == 1));
        assert!(queries.iter().all(|query| query.limit == 30));
        assert_eq!(queries[0].thread_id, SONG.thread_id());
    }

    #[tokio::test]
    async fn floor_falls_back_to_last_reply_time() {
        let service = MockService::default();
        service
            .push_page(Ok(page(&[1], true)))
            .push_floor(Ok(page(&[10, 11], true)))
            .push_floor(Ok(page(&[12], false)));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;

        controller.open_floor(comment(1, 0, false)).await;
        controller.load_floor_more().await;

        let queries = controller.service().floor_queries();
        assert_eq!(queries[1].time, comment(11, 0, false).time);
    }

    #[tokio::test]
    async fn floor_needs_an_active_resource() {
        let controller = controller(MockService::default());
        controller.open_floor(comment(1, 0, false)).await;
        controller.load_floor_more().await;
        assert!(controller.service().floor_queries().is_empty());
        assert!(controller.state().floor.parent.is_none());
    }

    #[tokio::test]
    async fn resource_switch_tears_down_floor() {
        let service = MockService::default();
        service
            .push_page(Ok(page(&[1], true)))
            .push_floor(Ok(page(&[10], true)))
            .push_page(Ok(page(&[2], true)));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;
        controller.open_floor(comment(1, 0, false)).await;

        controller.load_comments(OTHER_SONG, false).await;

        let state = controller.state();
        assert!(state.floor.parent.is_none());
        assert!(state.floor.comments.is_empty());
        assert_eq!(ids(&state.thread.comments), [2]);
    }

    #[tokio::test]
    async fn failed_like_keeps_reloaded_comments() {
        let gate = Arc::new(Notify::new());
        let service = MockService {
            like_gate: Some(Arc::clone(&gate)),
            ..MockService::default()
        };
        let mut first = page(&[], true);
        first.comments.push(comment(42, 5, false));
        let mut reloaded = page(&[], true);
        reloaded.comments.push(comment(42, 9, false));
        service
            .push_page(Ok(first))
            .push_page(Ok(reloaded))
            .push_like(Err(Error::transport("connection reset")));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;

        tokio::join!(controller.toggle_like(42), async {
            controller.refresh().await;
            gate.notify_one();
        });

        let state = controller.state();
        assert_eq!(state.thread.comments[0].liked_count, 9);
        assert!(!state.thread.comments[0].liked);
        assert!(state.thread.error.is_none());
    }

    #[tokio::test]
    async fn failed_like_restores_floor_only_if_still_open() {
        let gate = Arc::new(Notify::new());
        let service = MockService {
            like_gate: Some(Arc::clone(&gate)),
            ..MockService::default()
        };
        service
            .push_page(Ok(page(&[1], true)))
            .push_floor(Ok(page(&[10], true)))
            .push_floor(Ok(page(&[10], true)))
            .push_like(Err(Error::transport("connection reset")));
        let controller = controller(service);
        controller.load_comments(SONG, false).await;
        controller.open_floor(comment(1, 0, false)).await;

        tokio::join!(controller.toggle_like(10), async {
            controller.close_floor();
            controller.open_floor(comment(1, 0, false)).await;
            gate.notify_one();
        });

        // The reopened floor is fresh server state: it keeps what the
        // service returned, not the rolled back snapshot.
        let state = controller.state();
        assert_eq!(state.floor.comments[0].liked_count, 0);
        assert!(!state.floor.comments[0].liked);
        assert!(state.thread.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn profile_opens_and_closes() {
        let service = MockService::default();
        service.push_profile(Ok(user(7, "rain")));
        let controller = controller(service);

        controller.open_profile(7).await;
        let state = controller.state();
        assert_eq!(state.profile.user_id, Some(7));
        assert_eq!(state.profile.detail, Some(user(7, "rain")));
        assert!(!state.profile.loading);

        controller.close_profile();
        let state = controller.state();
        assert_eq!(state.profile.user_id, None);
        assert_eq!(state.profile.detail, None);

        // Deleted accounts have no profile to show.
        controller.open_profile(0).await;
        assert_eq!(*controller.service().profile_calls.lock().unwrap(), [7]);
    }

    #[tokio::test]
    async fn closed_profile_ignores_late_response() {
        let gate = Arc::new(Notify::new());
        let service = MockService {
            profile_gate: Some(Arc::clone(&gate)),
            ..MockService::default()
        };
        service.push_profile(Ok(user(7, "rain")));
        let controller = controller(service);

        tokio::join!(controller.open_profile(7), async {
            assert!(controller.state().profile.loading);
            controller.close_profile();
            gate.notify_one();
        });

        let state = controller.state();
        assert_eq!(state.profile, ProfileState {
            generation: 2,
            ..ProfileState::default()
        });
    }

    #[tokio::test]
    async fn failed_profile_sets_error() {
        let service = MockService::default();
        service.push_profile(Err(Error::api(404, Some("no such user"))));
        let controller = controller(service);

        controller.open_profile(7).await;

        let state = controller.state();
        assert_eq!(state.profile.user_id, Some(7));
        assert!(state.profile.detail.is_none());
        assert!(state.profile.error.as_deref().unwrap().contains("no such user"));
        assert!(state.thread.error.is_none());
    }

    #[tokio::test]
    async fn subscribers_see_every_transition() {
        let service = MockService::default();
        service.push_page(Ok(page(&[1], false)));
        let controller = controller(service);
        let mut receiver = controller.subscribe();

        controller.load_comments(SONG, false).await;

        assert!(receiver.has_changed().unwrap());
        assert_eq!(ids(&receiver.borrow_and_update().thread.comments), [1]);
    }
}
