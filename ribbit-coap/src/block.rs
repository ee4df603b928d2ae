use async_trait::async_trait;
use ribbit_coap_msg::opt::known;
use ribbit_coap_msg::{Block, Code, Packet, Token};

use crate::core::{Client, Error, Violation, What, When};

/// Block size exponent asked of the server (1024 byte blocks)
const SZX: u8 = 6;

/// Something a large download can be read from, a block at a time
#[async_trait]
pub trait ReadBlocks: Send {
  /// Fill the start of `buf` with the next block, returning how many
  /// bytes were written. `Ok(0)` marks the end of the stream.
  ///
  /// On error, `buf` is left untouched.
  async fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}

/// Sequentially fetches a resource with Block2 requests.
///
/// See [`Client::get_streaming`].
#[derive(Debug)]
pub struct BlockReader {
  client: Client,
  path: String,
  token: Option<Token>,
  num: u32,
}

impl BlockReader {
  /// Index of the block the next read will request
  pub fn block(&self) -> u32 {
    self.num
  }

  fn request(&self, token: Option<Token>) -> Result<Packet, Error> {
    let when = When::Streaming(self.num);
    let mut req = Client::build(Code::GET, &self.path).map_err(|e| when.what(e.what))?;
    req.set_block2(Block::from_szx(SZX, self.num, false))
       .map_err(|e| when.what(e.into()))?;
    req.token = token;
    Ok(req)
  }

  /// Request the current block until the server answers with it,
  /// giving it a second chance if it does not the first time
  async fn fetch(&self) -> Result<Packet, Error> {
    let mut token = self.token;
    let mut retried = false;

    loop {
      let rep = self.client
                    .request(self.request(token)?)
                    .await
                    .map_err(|e| When::Streaming(self.num).what(e.what))?;

      let received = rep.block2().map(|b| b.num());
      let single = rep.get(known::BLOCK2).count() == 1;
      if single && received == Some(self.num) {
        return Ok(rep);
      }

      if retried {
        let mismatch = Violation::BlockMismatch { requested: self.num,
                                                  received };
        return Err(When::Streaming(self.num).what(What::from(mismatch)));
      }

      log::warn!("asked for block {} of {} but got {:?}, asking again",
                 self.num,
                 self.path,
                 received);
      retried = true;
      token = rep.token;
    }
  }
}

#[async_trait]
impl ReadBlocks for BlockReader {
  async fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
    let rep = self.fetch().await?;
    let payload = &rep.payload.0;

    if payload.len() > buf.len() {
      let v = Violation::BufferTooSmall { needed: payload.len(),
                                          capacity: buf.len() };
      return Err(When::Streaming(self.num).what(v.into()));
    }

    buf[..payload.len()].copy_from_slice(payload);
    self.num += 1;
    self.token = rep.token;
    Ok(payload.len())
  }
}

impl Client {
  /// Read the resource at `path` block by block
  pub fn get_streaming(&self, path: impl ToString) -> BlockReader {
    BlockReader { client: self.clone(),
                  path: path.to_string(),
                  token: None,
                  num: 0 }
  }
}

#[cfg(test)]
mod tests {
  use ribbit_coap_msg::{Packet, Type};

  use super::*;
  use crate::test::{connected, piggyback, Remote};

  fn block_response(req: &Packet, num: u32, more: bool, payload: &[u8]) -> Packet {
    let mut rep = piggyback(req, Code::CONTENT, payload);
    rep.set_block2(Block::from_szx(SZX, num, more)).unwrap();
    rep
  }

  async fn expect_block(remote: &mut Remote, num: u32) -> Packet {
    let req = remote.recv().await;
    assert_eq!(req.ty, Type::Con);
    assert_eq!(req.path(), "firmware/1.2.0");
    assert_eq!(req.block2().map(|b| (b.num(), b.szx(), b.more())),
               Some((num, SZX, false)));
    req
  }

  #[tokio::test(start_paused = true)]
  async fn reads_blocks_in_sequence() {
    let (client, _, _remotes, mut remote) = connected().await;
    let mut reader = client.get_streaming("firmware/1.2.0");

    let read = tokio::spawn(async move {
      let mut buf = [0u8; 1024];
      let mut out = vec![];
      loop {
        let n = reader.read_into(&mut buf).await?;
        if n == 0 {
          break;
        }
        out.extend_from_slice(&buf[..n]);
      }
      Ok::<_, Error>((out, reader.block()))
    });

    let first = expect_block(&mut remote, 0).await;
    remote.send(block_response(&first, 0, true, &[1; 1024]));

    let second = expect_block(&mut remote, 1).await;
    assert_eq!(second.token, first.token);
    remote.send(block_response(&second, 1, true, &[2; 10]));

    let last = expect_block(&mut remote, 2).await;
    remote.send(block_response(&last, 2, false, &[]));

    let (bytes, blocks) = read.await.unwrap().unwrap();
    assert_eq!(bytes.len(), 1034);
    assert_eq!(&bytes[1024..], &[2; 10]);
    assert_eq!(blocks, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn mismatched_block_is_requested_once_more() {
    let (client, _, _remotes, mut remote) = connected().await;
    let mut reader = client.get_streaming("firmware/1.2.0");

    let read = tokio::spawn(async move {
      let mut buf = [9u8; 16];
      let n = reader.read_into(&mut buf).await;
      (n.map_err(|e| e.to_string()), buf, reader.block())
    });

    let req = expect_block(&mut remote, 0).await;
    remote.send(block_response(&req, 3, true, b"stale"));

    let again = expect_block(&mut remote, 0).await;
    assert_eq!(again.token, req.token);
    remote.send(block_response(&again, 0, true, b"fresh"));

    let (n, buf, block) = read.await.unwrap();
    assert_eq!(n, Ok(5));
    assert_eq!(&buf[..5], b"fresh");
    assert_eq!(block, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn second_mismatch_is_a_violation() {
    let (client, _, _remotes, mut remote) = connected().await;
    let mut reader = client.get_streaming("firmware/1.2.0");

    let read = tokio::spawn(async move {
      let mut buf = [9u8; 16];
      let r = reader.read_into(&mut buf).await;
      (r, buf, reader.block())
    });

    let req = expect_block(&mut remote, 0).await;
    remote.send(block_response(&req, 3, true, b"stale"));
    let req = expect_block(&mut remote, 0).await;
    remote.send(piggyback(&req, Code::CONTENT, b"no block option"));

    let (r, buf, block) = read.await.unwrap();
    let err = r.unwrap_err();
    assert_eq!(err.when, When::Streaming(0));
    assert_eq!(err.violation(),
               Some(&Violation::BlockMismatch { requested: 0,
                                                received: None }));
    assert_eq!(buf, [9u8; 16]);
    assert_eq!(block, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn duplicate_block_options_are_a_mismatch() {
    let (client, _, _remotes, mut remote) = connected().await;
    let mut reader = client.get_streaming("firmware/1.2.0");

    let read = tokio::spawn(async move {
      let mut buf = [9u8; 16];
      let r = reader.read_into(&mut buf).await;
      (r, buf)
    });

    for _ in 0..2 {
      let req = expect_block(&mut remote, 0).await;
      let mut rep = block_response(&req, 0, true, b"twice");
      rep.set_block2(Block::from_szx(SZX, 0, true)).unwrap();
      remote.send(rep);
    }

    let (r, buf) = read.await.unwrap();
    assert_eq!(r.unwrap_err().violation(),
               Some(&Violation::BlockMismatch { requested: 0,
                                                received: Some(0) }));
    assert_eq!(buf, [9u8; 16]);
  }

  #[tokio::test(start_paused = true)]
  async fn buffer_too_small_copies_nothing() {
    let (client, _, _remotes, mut remote) = connected().await;
    let mut reader = client.get_streaming("firmware/1.2.0");

    let read = tokio::spawn(async move {
      let mut buf = [0u8; 4];
      let r = reader.read_into(&mut buf).await;
      (r, buf, reader.block())
    });

    let req = expect_block(&mut remote, 0).await;
    remote.send(block_response(&req, 0, false, b"too long"));

    let (r, buf, block) = read.await.unwrap();
    assert_eq!(r.unwrap_err().violation(),
               Some(&Violation::BufferTooSmall { needed: 8,
                                                 capacity: 4 }));
    assert_eq!(buf, [0u8; 4]);
    assert_eq!(block, 0);
  }
}
