//! Waypoint edge operations, remote dialect.

use chrono::Utc;

use openmemory_core::models::Waypoint;
use openmemory_core::OmResult;

use crate::remote::{map_pg_err, rows, rq, PgExec};
use crate::sql::statements as st;

pub async fn upsert<E: PgExec>(exec: &E, wp: &Waypoint) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::UPSERT_WAYPOINT))
        .await
        .map_err(|e| map_pg_err(e, "upsert_waypoint prepare"))?;
    exec.exec(
        &stmt,
        &[
            &wp.src_id,
            &wp.dst_id,
            &wp.user_id,
            &wp.weight,
            &wp.created_at,
            &wp.updated_at,
        ],
    )
    .await
    .map_err(|e| map_pg_err(e, "upsert_waypoint"))?;
    Ok(())
}

pub async fn neighbors_of<E: PgExec>(
    exec: &E,
    src_id: &str,
    user_id: &str,
    limit: usize,
) -> OmResult<Vec<Waypoint>> {
    let stmt = exec
        .stmt(&rq(st::NEIGHBORS_OF))
        .await
        .map_err(|e| map_pg_err(e, "neighbors prepare"))?;
    let page = exec
        .rows(&stmt, &[&src_id, &user_id, &(limit as i64)])
        .await
        .map_err(|e| map_pg_err(e, "neighbors"))?;
    page.iter().map(rows::waypoint).collect()
}

pub async fn get_weight<E: PgExec>(
    exec: &E,
    src_id: &str,
    dst_id: &str,
    user_id: &str,
) -> OmResult<Option<f64>> {
    let stmt = exec
        .stmt(&rq(st::GET_WAYPOINT_WEIGHT))
        .await
        .map_err(|e| map_pg_err(e, "get_weight prepare"))?;
    let page = exec
        .rows(&stmt, &[&src_id, &dst_id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "get_weight"))?;
    page.first()
        .map(|r| r.try_get(0).map_err(|e| map_pg_err(e, "get_weight column")))
        .transpose()
}

pub async fn set_weight<E: PgExec>(
    exec: &E,
    src_id: &str,
    dst_id: &str,
    user_id: &str,
    weight: f64,
) -> OmResult<()> {
    let stmt = exec
        .stmt(&rq(st::SET_WAYPOINT_WEIGHT))
        .await
        .map_err(|e| map_pg_err(e, "set_weight prepare"))?;
    exec.exec(&stmt, &[&weight, &Utc::now(), &src_id, &dst_id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "set_weight"))?;
    Ok(())
}

pub async fn decay_all<E: PgExec>(exec: &E, factor: f64, user_id: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DECAY_WAYPOINTS))
        .await
        .map_err(|e| map_pg_err(e, "decay_waypoints prepare"))?;
    let n = exec
        .exec(&stmt, &[&factor, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "decay_waypoints"))?;
    Ok(n as usize)
}

pub async fn delete_for_memory<E: PgExec>(
    exec: &E,
    memory_id: &str,
    user_id: &str,
) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_WAYPOINTS_FOR_MEMORY))
        .await
        .map_err(|e| map_pg_err(e, "delete_waypoints prepare"))?;
    let n = exec
        .exec(&stmt, &[&memory_id, &memory_id, &user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_waypoints"))?;
    Ok(n as usize)
}

pub async fn delete_by_user<E: PgExec>(exec: &E, user_id: &str) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_WAYPOINTS_BY_USER))
        .await
        .map_err(|e| map_pg_err(e, "delete_waypoints_by_user prepare"))?;
    let n = exec
        .exec(&stmt, &[&user_id])
        .await
        .map_err(|e| map_pg_err(e, "delete_waypoints_by_user"))?;
    Ok(n as usize)
}

pub async fn delete_dangling<E: PgExec>(exec: &E) -> OmResult<usize> {
    let stmt = exec
        .stmt(&rq(st::DELETE_DANGLING_WAYPOINTS))
        .await
        .map_err(|e| map_pg_err(e, "delete_dangling prepare"))?;
    let n = exec
        .exec(&stmt, &[])
        .await
        .map_err(|e| map_pg_err(e, "delete_dangling"))?;
    Ok(n as usize)
}
