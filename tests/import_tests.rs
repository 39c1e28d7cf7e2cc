use std::path::{Path, PathBuf};

use yamdb::db::{Store, TitleFilter};
use yamdb::domain::Role;
use yamdb::import::import_dir;

struct Fixture {
    dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("yamdb_import_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.dir.join(name), content).unwrap();
    }

    async fn store(&self) -> Store {
        let url = format!("sqlite:{}?mode=rwc", self.dir.join("yamdb.db").display());
        Store::new(&url).await.unwrap()
    }

    fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn write_fixtures(fixture: &Fixture) {
    fixture.write(
        "category.csv",
        "id,name,slug\n1,Фильм,movie\n2,Книга,book\n3,Duplicate,movie\n",
    );
    fixture.write("genre.csv", "id,name,slug\n1,Драма,drama\n2,Комедия,comedy\n");
    fixture.write(
        "users.csv",
        "id,username,email,role,bio,first_name,last_name\n\
         100,bingobongo,bingobongo@yamdb.fake,user,,,\n\
         101,faust,faust@yamdb.fake,moderator,Devil,,\n\
         102,capt_obvious,capt_obvious@yamdb.fake,admin,,Captain,\n",
    );
    fixture.write(
        "titles.csv",
        "id,name,year,category\n\
         1,Побег из Шоушенка,1994,1\n\
         2,Крестный отец,1972,9\n\
         3,Broken year,abc,1\n",
    );
    fixture.write(
        "genre_title.csv",
        "id,title_id,genre_id\n1,1,1\n2,2,1\n3,2,2\n4,7,1\n",
    );
    fixture.write(
        "review.csv",
        "id,title_id,text,author,score,pub_date\n\
         1,1,Masterpiece,100,10,2019-09-24T21:08:21.567Z\n\
         2,1,Good,101,7,2019-09-24T21:08:21.567Z\n\
         3,1,Off the scale,102,11,2019-09-24T21:08:21.567Z\n\
         4,2,Ghost author,999,5,2019-09-24T21:08:21.567Z\n\
         5,2,Classic,102,9,\n",
    );
    fixture.write(
        "comments.csv",
        "id,review_id,text,author,pub_date\n\
         1,1,Agreed,101,2019-09-24T21:08:21.567Z\n\
         2,42,Orphan,101,2019-09-24T21:08:21.567Z\n",
    );
}

#[tokio::test]
async fn test_import_loads_fixtures() {
    let fixture = Fixture::new();
    write_fixtures(&fixture);
    let store = fixture.store().await;

    let report = import_dir(&store, fixture.path()).await.unwrap();

    let categories = report.get("category.csv").unwrap();
    assert_eq!((categories.inserted, categories.skipped), (2, 1));
    let titles = report.get("titles.csv").unwrap();
    assert_eq!((titles.inserted, titles.skipped), (2, 1));
    let links = report.get("genre_title.csv").unwrap();
    assert_eq!((links.inserted, links.skipped), (3, 1));
    let reviews = report.get("review.csv").unwrap();
    assert_eq!((reviews.inserted, reviews.skipped), (3, 2));
    let comments = report.get("comments.csv").unwrap();
    assert_eq!((comments.inserted, comments.skipped), (1, 1));

    let shawshank = store.titles().get(1).await.unwrap().unwrap();
    assert_eq!(shawshank.title.rating, Some(8.5));
    assert_eq!(shawshank.category.unwrap().slug, "movie");
    assert_eq!(shawshank.genres.len(), 1);

    // Unknown category 9 leaves the title uncategorised
    let godfather = store.titles().get(2).await.unwrap().unwrap();
    assert!(godfather.category.is_none());
    assert_eq!(godfather.genres.len(), 2);
    assert_eq!(godfather.title.rating, Some(9.0));

    let faust = store.users().get_by_username("faust").await.unwrap().unwrap();
    assert_eq!(faust.role, Role::Moderator);
    assert_eq!(faust.bio.as_deref(), Some("Devil"));

    let dramas = store
        .titles()
        .list(
            &TitleFilter {
                genre: Some("drama".to_string()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(dramas.total, 2);
}

#[tokio::test]
async fn test_import_is_repeatable() {
    let fixture = Fixture::new();
    write_fixtures(&fixture);
    let store = fixture.store().await;

    import_dir(&store, fixture.path()).await.unwrap();
    let second = import_dir(&store, fixture.path()).await.unwrap();

    assert!(second.files.iter().all(|f| f.inserted == 0));
    assert_eq!(store.titles().get(1).await.unwrap().unwrap().title.rating, Some(8.5));
}

#[tokio::test]
async fn test_import_skips_missing_files() {
    let fixture = Fixture::new();
    fixture.write("genre.csv", "id,name,slug\n1,Drama,drama\n");
    let store = fixture.store().await;

    let report = import_dir(&store, fixture.path()).await.unwrap();
    assert_eq!(report.files.len(), 1);
    assert!(report.get("category.csv").is_none());
    assert_eq!(report.get("genre.csv").unwrap().inserted, 1);
}
